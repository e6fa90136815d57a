use std::path::Path;
use std::sync::Mutex;

use log::{debug, info};
use opencv::core::{CV_32F, Mat, Rect, Scalar, Size};
use opencv::dnn::{self, Net};
use opencv::imgcodecs;
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;

use crate::config::ModelOptions;
use crate::error::ExtractionError;
use crate::utils;

/// ImageNet 均值与标准差，RGB 顺序
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 将图片转换为固定长度的特征向量
pub trait FeatureExtractor: Send + Sync {
    /// 特征向量维度
    fn dim(&self) -> usize;

    /// 提取特征，相同输入总是得到相同输出
    fn extract(&self, bytes: &[u8]) -> Result<Vec<f32>, ExtractionError>;
}

/// 使用 OpenCV DNN 加载 ONNX 格式的预训练骨干网络
pub struct DnnExtractor {
    // Net::forward 需要可变引用
    net: Mutex<Net>,
    opts: ModelOptions,
}

impl DnnExtractor {
    /// 加载模型，进程启动时调用一次
    pub fn load(model: &Path, opts: ModelOptions) -> Result<Self, ExtractionError> {
        if !model.is_file() {
            return Err(ExtractionError::ModelFailure(format!(
                "模型文件不存在: {}",
                model.display()
            )));
        }
        let path = model.to_string_lossy();
        let net = dnn::read_net_from_onnx(&path)?;
        if net.empty()? {
            return Err(ExtractionError::ModelFailure(format!("模型为空: {}", path)));
        }
        info!("模型加载完成: {}", path);
        Ok(Self { net: Mutex::new(net), opts })
    }
}

/// 缩放短边到 `resize`，再从中心裁剪 `input_size` 的正方形
///
/// 输入为三通道 BGR 图片，输出为 1×3×`input_size`×`input_size` 的 NCHW blob
pub fn preprocess(image: &Mat, opts: &ModelOptions) -> opencv::Result<Mat> {
    let (w, h) = (image.cols() as f64, image.rows() as f64);
    let scale = opts.resize as f64 / w.min(h);
    let size = Size::new((w * scale).round() as i32, (h * scale).round() as i32);
    let mut resized = Mat::default();
    imgproc::resize(
        image,
        &mut resized,
        size,
        0.,
        0.,
        InterpolationFlags::INTER_LINEAR as i32,
    )?;

    let crop = opts.input_size as i32;
    let x = ((resized.cols() - crop) / 2).max(0);
    let y = ((resized.rows() - crop) / 2).max(0);
    let roi = Rect::new(x, y, crop.min(resized.cols()), crop.min(resized.rows()));
    let cropped = Mat::roi(&resized, roi)?.try_clone()?;

    // BGR -> RGB，缩放到 [0, 1]，输出 NCHW
    let mut blob = dnn::blob_from_image(
        &cropped,
        1. / 255.,
        Size::new(crop, crop),
        Scalar::default(),
        true,
        false,
        CV_32F,
    )?;

    let plane = (crop * crop) as usize;
    let data = blob.data_typed_mut::<f32>()?;
    for (c, chunk) in data.chunks_mut(plane).enumerate().take(3) {
        for v in chunk {
            *v = (*v - MEAN[c]) / STD[c];
        }
    }
    Ok(blob)
}

impl FeatureExtractor for DnnExtractor {
    fn dim(&self) -> usize {
        self.opts.dim
    }

    fn extract(&self, bytes: &[u8]) -> Result<Vec<f32>, ExtractionError> {
        // IMREAD_COLOR 会把灰度、带透明通道等图片统一转换为三通道
        let image = utils::imdecode(bytes, imgcodecs::IMREAD_COLOR)
            .ok()
            .flatten()
            .ok_or(ExtractionError::DecodeFailure)?;
        let blob = preprocess(&image, &self.opts)?;

        let output = {
            let mut net = self
                .net
                .lock()
                .map_err(|e| ExtractionError::ModelFailure(e.to_string()))?;
            net.set_input(&blob, "", 1., Scalar::default())?;
            net.forward_single("")?
        };

        let features = output.data_typed::<f32>()?.to_vec();
        if features.len() != self.opts.dim {
            return Err(ExtractionError::ModelFailure(format!(
                "模型输出维度为 {}，配置为 {}",
                features.len(),
                self.opts.dim
            )));
        }
        debug!("提取特征完成，维度 {}", features.len());
        Ok(features)
    }
}
