use bytes::Bytes;
use hyper::StatusCode;
use serde::Serialize;

use crate::util::json::to_tabbed_json;

/// Every failure a caller can observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedPath,
    BucketRequired,
    BucketNotFound,
    IterationError,
    Marshalling,
    ObjectNotFound,
    ObjectIOResponse,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::MalformedPath,
        ErrorKind::BucketRequired,
        ErrorKind::BucketNotFound,
        ErrorKind::IterationError,
        ErrorKind::Marshalling,
        ErrorKind::ObjectNotFound,
        ErrorKind::ObjectIOResponse,
    ];

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::MalformedPath => "malformed object path",
            ErrorKind::BucketRequired => "bucket is required",
            ErrorKind::BucketNotFound => "bucket not found",
            ErrorKind::IterationError => "non-nil error during iteration",
            ErrorKind::Marshalling => "json marshalling error",
            ErrorKind::ObjectNotFound => "object not found",
            ErrorKind::ObjectIOResponse => "object io error",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::MalformedPath
            | ErrorKind::BucketRequired
            | ErrorKind::BucketNotFound
            | ErrorKind::ObjectNotFound => StatusCode::NOT_FOUND,
            ErrorKind::IterationError | ErrorKind::Marshalling | ErrorKind::ObjectIOResponse => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Value of the `error_group` log field.
    pub fn group(self) -> &'static str {
        match self {
            ErrorKind::MalformedPath => "malformed_path",
            ErrorKind::BucketRequired => "bucket_required",
            ErrorKind::BucketNotFound => "bucket_not_found",
            ErrorKind::IterationError => "iteration",
            ErrorKind::Marshalling => "marshalling",
            ErrorKind::ObjectNotFound => "object_not_found",
            ErrorKind::ObjectIOResponse => "object_io",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    pub message: String,
    pub status_code: u16,
}

impl ResponseMessage {
    pub fn as_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        to_tabbed_json(self)
    }
}

impl From<ErrorKind> for ResponseMessage {
    fn from(kind: ErrorKind) -> Self {
        Self {
            message: kind.message().to_string(),
            status_code: kind.status().as_u16(),
        }
    }
}

/// Error bodies rendered once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct ErrorCatalog {
    bodies: [Bytes; 7],
}

impl ErrorCatalog {
    pub fn new() -> Result<Self, serde_json::Error> {
        let mut bodies: [Bytes; 7] = Default::default();
        for kind in ErrorKind::ALL {
            bodies[kind.index()] = Bytes::from(ResponseMessage::from(kind).as_json()?);
        }

        Ok(Self { bodies })
    }

    pub fn body(&self, kind: ErrorKind) -> Bytes {
        self.bodies[kind.index()].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let cases = vec![
            (ErrorKind::MalformedPath, 404),
            (ErrorKind::BucketRequired, 404),
            (ErrorKind::BucketNotFound, 404),
            (ErrorKind::IterationError, 500),
            (ErrorKind::Marshalling, 500),
            (ErrorKind::ObjectNotFound, 404),
            (ErrorKind::ObjectIOResponse, 500),
        ];

        for (kind, expected) in cases {
            assert_eq!(kind.status().as_u16(), expected, "failed status for case: {:?}", kind);
        }
    }

    #[test]
    fn test_catalog_body() {
        let catalog = ErrorCatalog::new().unwrap();

        assert_eq!(
            catalog.body(ErrorKind::BucketNotFound),
            Bytes::from_static(b"{\n\t\"message\": \"bucket not found\",\n\t\"statusCode\": 404\n}")
        );
        assert_eq!(
            catalog.body(ErrorKind::ObjectIOResponse),
            Bytes::from_static(b"{\n\t\"message\": \"object io error\",\n\t\"statusCode\": 500\n}")
        );
    }

    #[test]
    fn test_catalog_covers_every_kind() {
        let catalog = ErrorCatalog::new().unwrap();

        for kind in ErrorKind::ALL {
            let body: serde_json::Value = serde_json::from_slice(&catalog.body(kind)).unwrap();
            assert_eq!(body["message"], kind.message(), "failed message for case: {:?}", kind);
            assert_eq!(body["statusCode"], kind.status().as_u16(), "failed status for case: {:?}", kind);
        }
    }
}
