use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{FromRequest, Multipart, Request};
use bytes::Bytes;
use thiserror::Error;

pub const IMAGE_FIELD: &str = "imageFile";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Rejected(#[from] MultipartRejection),
    #[error(transparent)]
    Read(#[from] MultipartError),
    #[error("no file field named `imageFile` in request")]
    MissingField,
}

/// Reads the whole `imageFile` part of a `multipart/form-data` body.
pub async fn read_image_field(request: Request) -> Result<Bytes, UploadError> {
    let mut multipart = Multipart::from_request(request, &()).await?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            return Ok(field.bytes().await?);
        }
    }

    Err(UploadError::MissingField)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{self, header};

    const BOUNDARY: &str = "relay-boundary";

    fn multipart_request(field: &str, content: &[u8]) -> Request {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"frame.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        http::Request::builder()
            .method("POST")
            .uri("/uploadImage")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_reads_image_field() {
        let content = [0u8, 1, 2, 255, b'\r', b'\n', 7];
        let bytes = read_image_field(multipart_request(IMAGE_FIELD, &content))
            .await
            .unwrap();

        assert_eq!(&bytes[..], &content[..]);
    }

    #[tokio::test]
    async fn test_missing_field() {
        let err = read_image_field(multipart_request("otherFile", b"data"))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::MissingField));
        assert_eq!(err.to_string(), "no file field named `imageFile` in request");
    }

    #[tokio::test]
    async fn test_rejects_non_multipart_body() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/uploadImage")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("not a form"))
            .unwrap();

        let err = read_image_field(request).await.unwrap_err();
        assert!(matches!(err, UploadError::Rejected(_)));
        assert!(!err.to_string().is_empty());
    }
}
