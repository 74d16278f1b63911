//! ONNX Runtime detector backend (YOLOv8-family models)
//!
//! Loaded once at startup and shared read-only across sessions. With the
//! `cuda` feature and the accelerator toggle on, the CUDA execution provider
//! is registered first; onnxruntime falls back to CPU when it is unavailable,
//! with an identical call contract either way.

use crate::detect::{non_max_suppression, BBox, Detection, Detector, COCO_CLASSES};
use crate::error::VisionError;
use crate::frame::Frame;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

const NMS_IOU_THRESHOLD: f32 = 0.45;

pub struct OnnxDetector {
    // Session::run takes &mut self in this ort release
    session: Mutex<Session>,
    input_size: u32,
    confidence_threshold: f32,
    device: &'static str,
}

impl OnnxDetector {
    /// Load a YOLOv8 ONNX model. `use_accelerator` selects the GPU execution
    /// provider once at startup; it is never re-negotiated per frame.
    pub fn new(
        model_path: &Path,
        confidence_threshold: f32,
        use_accelerator: bool,
    ) -> Result<Self, VisionError> {
        let builder = Session::builder()
            .map_err(|e| VisionError::Model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VisionError::Model(format!("Failed to set optimization level: {e}")))?;

        #[cfg(feature = "cuda")]
        let (builder, device) = if use_accelerator {
            use ort::execution_providers::CUDAExecutionProvider;
            let builder = builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .map_err(|e| {
                    VisionError::Model(format!("Failed to register CUDA provider: {e}"))
                })?;
            (builder, "cuda")
        } else {
            (builder, "cpu")
        };

        #[cfg(not(feature = "cuda"))]
        let device = {
            if use_accelerator {
                tracing::warn!("Accelerator requested but the cuda feature is not compiled in; using CPU");
            }
            "cpu"
        };

        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| VisionError::Model(format!("Failed to load model: {e}")))?;

        info!(path = %model_path.display(), device, "Detection model loaded");

        Ok(Self {
            session: Mutex::new(session),
            input_size: 640,
            confidence_threshold,
            device,
        })
    }

    /// Letterbox the frame to `input_size` square, grey-padded, CHW f32 [0,1].
    /// Returns the tensor data plus the scale and padding needed to map boxes
    /// back to frame coordinates.
    fn preprocess(&self, frame: &Frame) -> Result<(Vec<f32>, f32, f32, f32), VisionError> {
        let sz = self.input_size;
        let img: image::RgbImage =
            image::ImageBuffer::from_raw(frame.width, frame.height, frame.pixels.clone())
                .ok_or_else(|| VisionError::Inference("frame buffer size mismatch".to_string()))?;

        let scale = (sz as f32 / frame.width as f32).min(sz as f32 / frame.height as f32);
        let new_w = ((frame.width as f32 * scale) as u32).max(1);
        let new_h = ((frame.height as f32 * scale) as u32).max(1);
        let pad_x = (sz - new_w) as f32 / 2.0;
        let pad_y = (sz - new_h) as f32 / 2.0;

        let resized =
            image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Triangle);

        // 114-grey padding, standard YOLOv8 letterbox fill
        let mut data = vec![114.0 / 255.0; 3 * sz as usize * sz as usize];
        let plane = (sz * sz) as usize;
        for (x, y, px) in resized.enumerate_pixels() {
            let row = y as usize + pad_y as usize;
            let col = x as usize + pad_x as usize;
            let idx = row * sz as usize + col;
            data[idx] = px.0[0] as f32 / 255.0;
            data[plane + idx] = px.0[1] as f32 / 255.0;
            data[2 * plane + idx] = px.0[2] as f32 / 255.0;
        }

        Ok((data, scale, pad_x, pad_y))
    }

    /// Decode the YOLOv8 output layout [1, 4 + classes, boxes].
    fn postprocess(
        &self,
        shape: &[i64],
        data: &[f32],
        frame: &Frame,
        scale: f32,
        pad_x: f32,
        pad_y: f32,
    ) -> Vec<Detection> {
        if shape.len() != 3 || shape[1] < 5 {
            debug!(?shape, "Unexpected detector output shape");
            return Vec::new();
        }

        let num_attrs = shape[1] as usize;
        let num_boxes = shape[2] as usize;
        let num_classes = (num_attrs - 4).min(COCO_CLASSES.len());
        let at = |attr: usize, b: usize| data[attr * num_boxes + b];

        let frame_w = frame.width as f32;
        let frame_h = frame.height as f32;

        let mut detections = Vec::new();
        for b in 0..num_boxes {
            let mut best_class = 0usize;
            let mut best_score = 0.0f32;
            for c in 0..num_classes {
                let score = at(4 + c, b);
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }
            if best_score < self.confidence_threshold {
                continue;
            }

            // cx/cy/w/h in letterbox coordinates -> frame pixels
            let cx = (at(0, b) - pad_x) / scale;
            let cy = (at(1, b) - pad_y) / scale;
            let w = at(2, b) / scale;
            let h = at(3, b) / scale;
            let x = (cx - w / 2.0).clamp(0.0, frame_w);
            let y = (cy - h / 2.0).clamp(0.0, frame_h);
            let w = w.min(frame_w - x);
            let h = h.min(frame_h - y);
            if w <= 0.0 || h <= 0.0 || !x.is_finite() || !y.is_finite() {
                continue;
            }

            detections.push(Detection {
                label: COCO_CLASSES[best_class].to_string(),
                confidence: best_score,
                bbox: BBox::new(x, y, w, h),
            });
        }

        non_max_suppression(detections, NMS_IOU_THRESHOLD)
    }
}

impl Detector for OnnxDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        let sz = self.input_size as usize;
        let (data, scale, pad_x, pad_y) = self.preprocess(frame)?;

        let input = Tensor::from_array(([1usize, 3, sz, sz], data))
            .map_err(|e| VisionError::Inference(format!("Failed to build input tensor: {e}")))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs!["images" => input])
            .map_err(|e| VisionError::Inference(format!("Inference failed: {e}")))?;

        let (shape, output) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(format!("Failed to extract output: {e}")))?;

        let detections = self.postprocess(shape, output, frame, scale, pad_x, pad_y);
        debug!(count = detections.len(), "Detector produced detections");
        Ok(detections)
    }

    fn device(&self) -> &'static str {
        self.device
    }
}
