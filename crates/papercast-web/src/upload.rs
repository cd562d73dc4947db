use axum::extract::Multipart;

/// An uploaded PDF with its data and client-side name.
pub struct UploadedPdf {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Parsed form fields from the `/process` multipart upload.
pub struct ProcessForm {
    pub pdfs: Vec<UploadedPdf>,
    /// Raw JSON text of the `data` field, if present.
    pub data: Option<String>,
}

/// Parse a multipart form upload. Errors are client errors (HTTP 400).
pub async fn parse_multipart(mut multipart: Multipart) -> Result<ProcessForm, String> {
    let mut pdfs = Vec::new();
    let mut data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Failed to read form field: {}", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "pdf_files" => {
                let filename = field.file_name().unwrap_or("upload.pdf").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read file data: {}", e))?;
                // Browsers send an empty part when no file is picked.
                if bytes.is_empty() && filename.is_empty() {
                    continue;
                }
                check_pdf(&filename, &bytes)?;
                pdfs.push(UploadedPdf {
                    filename,
                    data: bytes.to_vec(),
                });
            }
            "data" => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read data: {}", e))?;
                data = Some(val);
            }
            _ => {
                // Ignore unknown fields
                let _ = field.bytes().await;
            }
        }
    }

    Ok(ProcessForm { pdfs, data })
}

/// Accept only PDFs, recognised by their magic bytes.
pub fn check_pdf(filename: &str, data: &[u8]) -> Result<(), String> {
    if data.starts_with(b"%PDF-") {
        return Ok(());
    }
    if filename.to_lowercase().ends_with(".pdf") {
        return Err(format!(
            "{} has .pdf extension but doesn't appear to be a valid PDF",
            filename
        ));
    }
    Err(format!(
        "Unsupported file type for {}. Only PDF uploads are accepted.",
        filename
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_magic_is_accepted_regardless_of_name() {
        assert!(check_pdf("scan", b"%PDF-1.7\n...").is_ok());
    }

    #[test]
    fn fake_pdf_is_rejected() {
        let err = check_pdf("paper.pdf", b"PK\x03\x04").unwrap_err();
        assert!(err.contains("doesn't appear to be a valid PDF"));
    }

    #[test]
    fn other_files_are_rejected() {
        let err = check_pdf("notes.txt", b"hello").unwrap_err();
        assert!(err.contains("Only PDF uploads"));
    }
}
