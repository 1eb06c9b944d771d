#![warn(missing_docs)]
//! # quickedit-image-upload
//!
//! ## Purpose
//! Implements the upload and validation pipeline of one editable image region.
//!
//! ## Responsibilities
//! - Build backend URLs for a field (upload and field-info routes).
//! - Encode the picked file as a `multipart/form-data` body.
//! - Dispatch requests through an injectable [`Transport`] and track the
//!   request currently in flight for each request kind.
//! - Interpret completions into a [`PipelineOutcome`]: accepted upload,
//!   validation rejection, loaded metadata, transport failure, or stale.
//!
//! ## Data flow
//! [`UploadPipeline::begin_upload`] -> [`Dispatch`] handed to a [`Transport`]
//! -> transport posts a [`Completion`] -> [`UploadPipeline::complete`] ->
//! [`PipelineOutcome`] applied by the editor.
//!
//! ## Ownership and lifetimes
//! Requests own their URL and body so transports may move them to worker
//! threads. The pipeline keeps only tickets, never a reference to the region.
//!
//! ## Error model
//! Endpoint construction fails with [`EndpointError`]. Network, status, and
//! body-shape failures are reported as [`TransportError`] inside
//! [`PipelineOutcome::Failed`] and never escalate to validation errors.
//!
//! ## Concurrency
//! At most one upload and one metadata fetch are in flight per pipeline. A
//! second upload requested while one is in flight is ignored.

mod http;

use std::sync::atomic::{AtomicU64, Ordering};

use quickedit_image_contract::{
    FieldMetadata, UploadRejection, UploadResponse, parse_field_metadata, parse_upload_response,
};
use quickedit_image_core::{FALLBACK_MIME_TYPE, FieldId, UploadFile};
use quickedit_image_ui::extract_field_fragment;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

pub use http::HttpTransport;

/// Default route prefix of the backend endpoints.
pub const DEFAULT_ROUTE_PREFIX: &str = "quickedit_image";
/// Path suffix of the field-info route.
pub const INFO_PATH_SUFFIX: &str = "info";
/// Multipart part name carrying the image.
pub const UPLOAD_PART_NAME: &str = "files[image]";
/// Accept header value sent with every request.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Backend endpoint layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
    route_prefix: Vec<String>,
}

impl Endpoints {
    /// Creates a validated endpoint layout.
    ///
    /// # Errors
    /// Returns [`EndpointError::InvalidBase`] when `base` is not an absolute
    /// `http`/`https` URL that can carry a path.
    pub fn new(base: &str, route_prefix: &str) -> Result<Self, EndpointError> {
        let base = validate_base_url(base)?;
        let route_prefix = route_prefix
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self { base, route_prefix })
    }

    /// Base URL every route is resolved against.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// URL of the upload route for `field`.
    pub fn upload_url(&self, field: &FieldId) -> Result<Url, EndpointError> {
        self.route(field, None)
    }

    /// URL of the field-info route for `field`.
    pub fn info_url(&self, field: &FieldId) -> Result<Url, EndpointError> {
        self.route(field, Some(INFO_PATH_SUFFIX))
    }

    fn route(&self, field: &FieldId, suffix: Option<&str>) -> Result<Url, EndpointError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| EndpointError::InvalidBase("base cannot carry a path".to_string()))?;
            segments.pop_if_empty();
            segments.extend(&self.route_prefix);
            segments.extend(field.path_segments());
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}

/// Validates a backend base URL.
///
/// # Errors
/// Returns [`EndpointError::InvalidBase`] for unparsable, non-HTTP(S), or
/// cannot-be-a-base URLs.
pub fn validate_base_url(base: &str) -> Result<Url, EndpointError> {
    let parsed = Url::parse(base)
        .map_err(|error| EndpointError::InvalidBase(format!("invalid base url: {error}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(EndpointError::InvalidBase(
            "base url must use http or https".to_string(),
        ));
    }

    if parsed.cannot_be_a_base() {
        return Err(EndpointError::InvalidBase(
            "base url cannot carry a path".to_string(),
        ));
    }

    Ok(parsed)
}

/// Hex SHA-256 digest of a file's contents.
///
/// Used to identify uploads in logs and to derive multipart boundaries.
pub fn fingerprint_for_file(file: &UploadFile) -> String {
    hex::encode(Sha256::digest(&file.bytes))
}

/// Encoded `multipart/form-data` body with one file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl MultipartBody {
    /// Encodes `file` as the [`UPLOAD_PART_NAME`] part.
    pub fn for_file(file: &UploadFile) -> Self {
        let fingerprint = fingerprint_for_file(file);
        let boundary = format!("----quickedit-image-{}", &fingerprint[..24]);

        let mut bytes = Vec::with_capacity(file.bytes.len() + 256);
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        bytes.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{UPLOAD_PART_NAME}\"; filename=\"{}\"\r\n",
                escape_disposition_value(&file.name)
            )
            .as_bytes(),
        );
        let mime_type = part_mime_type(&file.mime_type);
        bytes.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
        bytes.extend_from_slice(&file.bytes);
        bytes.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Self { boundary, bytes }
    }

    /// Part boundary.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `Content-Type` header value.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encoded body.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Browser-reported types with control characters or no `/` fall back to
/// [`FALLBACK_MIME_TYPE`].
fn part_mime_type(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.contains('/') && !trimmed.chars().any(char::is_control) {
        trimmed
    } else {
        FALLBACK_MIME_TYPE
    }
}

fn escape_disposition_value(raw: &str) -> String {
    raw.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Identifies one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestTicket(u64);

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

impl RequestTicket {
    /// Allocates a process-unique ticket.
    pub fn next() -> Self {
        Self(NEXT_TICKET.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric ticket value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Request kinds issued by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Field-info GET.
    FetchMetadata,
    /// Image upload POST.
    Upload,
}

/// Request handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRequest {
    /// Idempotent field-info lookup.
    FetchMetadata {
        /// Target URL.
        url: Url,
    },
    /// Side-effecting image upload.
    Upload {
        /// Target URL.
        url: Url,
        /// Encoded form body.
        body: MultipartBody,
    },
}

impl BackendRequest {
    /// HTTP method.
    pub fn method(&self) -> &'static str {
        match self {
            BackendRequest::FetchMetadata { .. } => "GET",
            BackendRequest::Upload { .. } => "POST",
        }
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        match self {
            BackendRequest::FetchMetadata { url } | BackendRequest::Upload { url, .. } => url,
        }
    }

    /// Request kind.
    pub fn kind(&self) -> RequestKind {
        match self {
            BackendRequest::FetchMetadata { .. } => RequestKind::FetchMetadata,
            BackendRequest::Upload { .. } => RequestKind::Upload,
        }
    }
}

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Ticket the completion must carry.
    pub ticket: RequestTicket,
    /// Request to send.
    pub request: BackendRequest,
}

/// Raw HTTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpReply {
    /// Convenience constructor for a `200 OK` JSON reply.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Response delivered back to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Ticket of the originating request.
    pub ticket: RequestTicket,
    /// Reply or transport failure.
    pub result: Result<HttpReply, TransportError>,
}

/// Non-blocking request sink.
///
/// Implementations start the request and return immediately; the reply is
/// delivered later as a [`Completion`] carrying the same ticket.
pub trait Transport: Send + Sync {
    /// Starts `request`.
    ///
    /// # Errors
    /// Returns [`TransportError::Unavailable`] when the request could not be
    /// started at all.
    fn send(&self, ticket: RequestTicket, request: BackendRequest) -> Result<(), TransportError>;
}

/// Outcome of an upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStart {
    /// Request built; the caller must hand it to the transport.
    Started(Dispatch),
    /// Another upload is still in flight; nothing was sent.
    Ignored {
        /// Ticket of the upload that keeps running.
        in_flight: RequestTicket,
    },
}

/// Interpreted completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Completion belongs to an abandoned or unknown request.
    Stale,
    /// Upload accepted; `content` is the field container's inner markup.
    Uploaded {
        /// Identifier of the stored file.
        fid: u64,
        /// Markup to splice into the region.
        content: String,
    },
    /// Upload rejected by server-side validation.
    Rejected(UploadRejection),
    /// Field metadata fetched.
    MetadataLoaded(FieldMetadata),
    /// Request failed without a usable response.
    Failed {
        /// Kind of the failed request.
        kind: RequestKind,
        /// Failure detail.
        error: TransportError,
    },
}

#[derive(Debug, Clone)]
struct InFlightUpload {
    ticket: RequestTicket,
    file_name: String,
}

/// Upload and validation pipeline of one region.
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    endpoints: Endpoints,
    upload_in_flight: Option<InFlightUpload>,
    metadata_in_flight: Option<RequestTicket>,
}

impl UploadPipeline {
    /// Creates an idle pipeline.
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            upload_in_flight: None,
            metadata_in_flight: None,
        }
    }

    /// Returns `true` while an upload awaits its completion.
    pub fn is_uploading(&self) -> bool {
        self.upload_in_flight.is_some()
    }

    /// Returns `true` while a metadata fetch awaits its completion.
    pub fn is_fetching_metadata(&self) -> bool {
        self.metadata_in_flight.is_some()
    }

    /// Prepares an upload of `file` to `field`.
    ///
    /// # Errors
    /// Returns [`EndpointError`] when the upload URL cannot be built.
    pub fn begin_upload(
        &mut self,
        field: &FieldId,
        file: &UploadFile,
    ) -> Result<UploadStart, EndpointError> {
        if let Some(in_flight) = &self.upload_in_flight {
            tracing::warn!(
                field = %field,
                file = %file.name,
                in_flight = in_flight.ticket.get(),
                in_flight_file = %in_flight.file_name,
                "upload ignored while another upload is in flight"
            );
            return Ok(UploadStart::Ignored {
                in_flight: in_flight.ticket,
            });
        }

        let url = self.endpoints.upload_url(field)?;
        let body = MultipartBody::for_file(file);
        let ticket = RequestTicket::next();
        tracing::debug!(
            field = %field,
            ticket = ticket.get(),
            file = %file.name,
            size = file.size(),
            boundary = body.boundary(),
            "upload dispatched"
        );

        self.upload_in_flight = Some(InFlightUpload {
            ticket,
            file_name: file.name.clone(),
        });
        Ok(UploadStart::Started(Dispatch {
            ticket,
            request: BackendRequest::Upload { url, body },
        }))
    }

    /// Prepares a metadata fetch for `field`.
    ///
    /// Returns `Ok(None)` when a fetch is already in flight.
    ///
    /// # Errors
    /// Returns [`EndpointError`] when the info URL cannot be built.
    pub fn begin_metadata_fetch(&mut self, field: &FieldId) -> Result<Option<Dispatch>, EndpointError> {
        if self.metadata_in_flight.is_some() {
            return Ok(None);
        }

        let url = self.endpoints.info_url(field)?;
        let ticket = RequestTicket::next();
        tracing::debug!(field = %field, ticket = ticket.get(), "metadata fetch dispatched");

        self.metadata_in_flight = Some(ticket);
        Ok(Some(Dispatch {
            ticket,
            request: BackendRequest::FetchMetadata { url },
        }))
    }

    /// Forgets every in-flight request; their completions become stale.
    pub fn abandon(&mut self) {
        if let Some(upload) = self.upload_in_flight.take() {
            tracing::debug!(ticket = upload.ticket.get(), "upload abandoned");
        }
        self.metadata_in_flight = None;
    }

    /// Interprets a completion.
    pub fn complete(&mut self, completion: Completion) -> PipelineOutcome {
        let kind = if self
            .upload_in_flight
            .as_ref()
            .is_some_and(|upload| upload.ticket == completion.ticket)
        {
            self.upload_in_flight = None;
            RequestKind::Upload
        } else if self.metadata_in_flight == Some(completion.ticket) {
            self.metadata_in_flight = None;
            RequestKind::FetchMetadata
        } else {
            tracing::debug!(ticket = completion.ticket.get(), "stale completion dropped");
            return PipelineOutcome::Stale;
        };

        let reply = match completion.result.and_then(require_success_status) {
            Ok(reply) => reply,
            Err(error) => return failed(kind, error),
        };

        match kind {
            RequestKind::Upload => interpret_upload(&reply.body),
            RequestKind::FetchMetadata => match parse_field_metadata(&reply.body) {
                Ok(metadata) => PipelineOutcome::MetadataLoaded(metadata),
                Err(error) => failed(kind, TransportError::Malformed(error.to_string())),
            },
        }
    }
}

fn require_success_status(reply: HttpReply) -> Result<HttpReply, TransportError> {
    if (200..300).contains(&reply.status) {
        Ok(reply)
    } else {
        Err(TransportError::Status(reply.status))
    }
}

fn interpret_upload(body: &str) -> PipelineOutcome {
    match parse_upload_response(body) {
        Ok(UploadResponse::Accepted(success)) => match extract_field_fragment(&success.html) {
            Ok(content) => PipelineOutcome::Uploaded {
                fid: success.fid,
                content,
            },
            Err(error) => failed(RequestKind::Upload, TransportError::Malformed(error.to_string())),
        },
        Ok(UploadResponse::Rejected(rejection)) => PipelineOutcome::Rejected(rejection),
        Err(error) => failed(RequestKind::Upload, TransportError::Malformed(error.to_string())),
    }
}

fn failed(kind: RequestKind, error: TransportError) -> PipelineOutcome {
    tracing::warn!(
        ?kind,
        class = ?classify_transport_error(&error),
        %error,
        "request failed"
    );
    PipelineOutcome::Failed { kind, error }
}

/// Transport failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Repeating the gesture may succeed.
    Retriable,
    /// Repeating the gesture will fail the same way.
    Permanent,
}

/// Classifies transport failures for diagnostics.
pub fn classify_transport_error(error: &TransportError) -> FailureClass {
    match error {
        TransportError::Network(_) | TransportError::Timeout | TransportError::Unavailable(_) => {
            FailureClass::Retriable
        }
        TransportError::Status(status) if *status >= 500 || *status == 408 || *status == 429 => {
            FailureClass::Retriable
        }
        TransportError::Status(_) | TransportError::Malformed(_) => FailureClass::Permanent,
    }
}

/// Endpoint construction errors.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Base URL violates endpoint requirements.
    #[error("invalid backend base url: {0}")]
    InvalidBase(String),
}

/// Failures that leave no usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection-level failure.
    #[error("network failure: {0}")]
    Network(String),
    /// Request timed out.
    #[error("request timed out")]
    Timeout,
    /// Server answered with a non-success status.
    #[error("unexpected http status {0}")]
    Status(u16),
    /// Body could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Request could not be started.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}
