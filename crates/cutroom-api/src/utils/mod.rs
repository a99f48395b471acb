pub mod upload;

pub use upload::{
    bytes_to_mb, receive_upload, sanitize_filename, validate_video_extension, ReceivedUpload,
    StagedFile,
};
