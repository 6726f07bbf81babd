use std::fmt;

pub(crate) const NO_FILE_PROVIDED: &str = "NO_FILE_PROVIDED";
pub(crate) const EMPTY_FILENAME: &str = "EMPTY_FILENAME";
pub(crate) const UNSUPPORTED_FORMAT: &str = "UNSUPPORTED_FORMAT";
pub(crate) const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
pub(crate) const EXTRACTION_FAILED: &str = "EXTRACTION_FAILED";
pub(crate) const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoFileProvided,
    EmptyFilename,
    UnsupportedFormat,
    FileTooLarge,
    ExtractionFailure,
    InternalFailure,
}

#[derive(Debug, Clone)]
pub struct ConvertError {
    kind: ErrorKind,
    message: String,
}

impl ConvertError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_file() -> Self {
        Self::new(ErrorKind::NoFileProvided, "No file uploaded")
    }

    /// multipart 本身无法解析时也按“未收到文件”处理。
    pub fn invalid_upload(detail: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::NoFileProvided,
            format!("Invalid multipart upload: {detail}"),
        )
    }

    pub fn empty_filename() -> Self {
        Self::new(ErrorKind::EmptyFilename, "No file selected")
    }

    pub fn unsupported(extension: &str) -> Self {
        let shown = if extension.is_empty() {
            "(none)"
        } else {
            extension
        };
        Self::new(
            ErrorKind::UnsupportedFormat,
            format!("Unsupported file format: {shown}"),
        )
    }

    pub fn too_large(limit: usize) -> Self {
        Self::new(
            ErrorKind::FileTooLarge,
            format!("File exceeds the upload limit of {limit} bytes"),
        )
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExtractionFailure, message)
    }

    /// 内部错误的细节只进日志，不返回给调用方。
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalFailure, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            ErrorKind::NoFileProvided => NO_FILE_PROVIDED,
            ErrorKind::EmptyFilename => EMPTY_FILENAME,
            ErrorKind::UnsupportedFormat => UNSUPPORTED_FORMAT,
            ErrorKind::FileTooLarge => PAYLOAD_TOO_LARGE,
            ErrorKind::ExtractionFailure => EXTRACTION_FAILED,
            ErrorKind::InternalFailure => INTERNAL_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn public_message(&self) -> &str {
        match self.kind {
            ErrorKind::InternalFailure => "Internal server error",
            _ => &self.message,
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message)
    }
}

impl std::error::Error for ConvertError {}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("io error: {err}"))
    }
}
