use super::domain::AssignmentId;
use super::repository::{DocumentError, DocumentUpload};

/// File received from a multipart form before validation.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn resolve_content_type(file: &UploadedFile) -> mime::Mime {
    file.content_type
        .as_deref()
        .and_then(|raw| raw.parse::<mime::Mime>().ok())
        .filter(|parsed| *parsed != mime::APPLICATION_OCTET_STREAM)
        .unwrap_or_else(|| mime_guess::from_path(&file.file_name).first_or_octet_stream())
}

fn is_accepted_document(content_type: &mime::Mime) -> bool {
    content_type.type_() == mime::IMAGE
        || (content_type.type_() == mime::APPLICATION && content_type.subtype() == mime::PDF)
}

/// Check size and type of an uploaded document and tag it for storage.
pub fn prepare_upload(
    assignment_id: &AssignmentId,
    kind: &'static str,
    file: UploadedFile,
    limit: usize,
) -> Result<DocumentUpload, DocumentError> {
    if file.bytes.is_empty() {
        return Err(DocumentError::MissingFile);
    }
    if file.bytes.len() > limit {
        return Err(DocumentError::TooLarge { limit });
    }

    let content_type = resolve_content_type(&file);
    if !is_accepted_document(&content_type) {
        return Err(DocumentError::UnsupportedType(content_type.to_string()));
    }

    Ok(DocumentUpload {
        assignment_id: assignment_id.clone(),
        kind,
        file_name: file.file_name,
        content_type,
        bytes: file.bytes,
    })
}
