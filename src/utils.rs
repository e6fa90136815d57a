use indicatif::ProgressStyle;
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use opencv::prelude::*;

/// 允许上传的图片后缀
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

/// 检查文件名后缀是否在允许列表中，大小写不敏感
pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// 从内存中解码图片，解码失败时返回 None
///
/// `flags` 为 `imgcodecs::IMREAD_*`
pub fn imdecode(bytes: &[u8], flags: i32) -> opencv::Result<Option<Mat>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let buf = Vector::<u8>::from_slice(bytes);
    let img = imgcodecs::imdecode(&buf, flags)?;
    if img.empty() { Ok(None) } else { Ok(Some(img)) }
}

/// 检查字节是否能完整解码为一张图片
pub fn is_valid_image(bytes: &[u8]) -> bool {
    matches!(imdecode(bytes, imgcodecs::IMREAD_UNCHANGED), Ok(Some(_)))
}

/// 分数保留三位小数
pub fn round_score(score: f32) -> f32 {
    (score * 1000.).round() / 1000.
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("[{elapsed_precise}] {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
