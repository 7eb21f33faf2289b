use thiserror::Error;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// 自定义错误类型
///
/// 所有错误都在检测点同步抛出，内部不做重试
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Variable '{variable}' has an unexpected data type: declared {declared}, got {requested}")]
    TypeMismatch {
        variable: String,
        declared: String,
        requested: String,
    },

    #[error("Variable '{0}' is defined on multiple locations, aborting")]
    MultipleDefinitions(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SaveError {
    pub(crate) fn type_mismatch(
        variable: &str,
        declared: impl std::fmt::Display,
        requested: impl std::fmt::Display,
    ) -> Self {
        SaveError::TypeMismatch {
            variable: variable.to_string(),
            declared: declared.to_string(),
            requested: requested.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SaveError>;

/// 在文件/目录名中不安全的字符
const PATH_UNSAFE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', ';'];

/// 去除单个字符的变音符号
///
/// 使用规范分解后的第一个非组合字符，逐字符映射，字符数保持不变
pub fn strip_accent(c: char) -> char {
    if c.is_ascii() {
        return c;
    }
    std::iter::once(c)
        .nfd()
        .find(|d| !is_combining_mark(*d))
        .unwrap_or(c)
}

/// 文本规范化：去除所有变音符号
///
/// 存档格式只支持单平面字符，写入前统一处理
pub fn normalize_text(text: &str) -> String {
    text.chars().map(strip_accent).collect()
}

/// 规范化并去除路径不安全字符，用于将成为文件名的字符串
pub fn sanitize_path_component(text: &str) -> String {
    text.chars()
        .map(strip_accent)
        .filter(|c| !PATH_UNSAFE_CHARS.contains(c))
        .collect()
}
