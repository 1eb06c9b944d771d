//! Blocking `ureq` requests executed on worker threads.
//!
//! Each request runs on its own named thread; the reply is posted to an
//! `mpsc` channel that the UI thread drains between events.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::{BackendRequest, Completion, HttpReply, JSON_MEDIA_TYPE, RequestTicket, Transport, TransportError};

/// HTTP transport posting completions to a channel.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    completions: Sender<Completion>,
}

impl HttpTransport {
    /// Creates a transport and the receiver its completions arrive on.
    pub fn new(timeout: Duration) -> (Self, Receiver<Completion>) {
        let (completions, receiver) = mpsc::channel();
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        (Self { agent, completions }, receiver)
    }
}

impl Transport for HttpTransport {
    fn send(&self, ticket: RequestTicket, request: BackendRequest) -> Result<(), TransportError> {
        let agent = self.agent.clone();
        let completions = self.completions.clone();

        std::thread::Builder::new()
            .name(format!("quickedit-image-request-{}", ticket.get()))
            .spawn(move || {
                let result = execute(&agent, &request);
                if completions.send(Completion { ticket, result }).is_err() {
                    tracing::debug!(ticket = ticket.get(), "completion receiver dropped");
                }
            })
            .map(|_| ())
            .map_err(|error| TransportError::Unavailable(format!("failed to spawn request thread: {error}")))
    }
}

fn execute(agent: &ureq::Agent, request: &BackendRequest) -> Result<HttpReply, TransportError> {
    let response = match request {
        BackendRequest::FetchMetadata { url } => agent
            .get(url.as_str())
            .set("Accept", JSON_MEDIA_TYPE)
            .set("Cache-Control", "no-cache")
            .call(),
        BackendRequest::Upload { url, body } => agent
            .post(url.as_str())
            .set("Accept", JSON_MEDIA_TYPE)
            .set("Cache-Control", "no-cache")
            .set("Content-Type", &body.content_type())
            .send_bytes(body.as_bytes()),
    };

    match response {
        Ok(response) => {
            let status = response.status();
            let body = response.into_string().map_err(map_io_error)?;
            Ok(HttpReply { status, body })
        }
        Err(ureq::Error::Status(status, response)) => Ok(HttpReply {
            status,
            body: response.into_string().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(transport)) => {
            let timed_out = std::error::Error::source(&transport)
                .and_then(|source| source.downcast_ref::<io::Error>())
                .is_some_and(is_timeout);
            if timed_out {
                Err(TransportError::Timeout)
            } else {
                Err(TransportError::Network(transport.to_string()))
            }
        }
    }
}

fn map_io_error(error: io::Error) -> TransportError {
    if is_timeout(&error) {
        TransportError::Timeout
    } else {
        TransportError::Network(error.to_string())
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    //! Unit tests for the channel-backed transport.

    use super::*;
    use crate::{BackendRequest, Endpoints};

    #[test]
    fn unreachable_backend_reports_failure_through_channel() {
        let (transport, completions) = HttpTransport::new(Duration::from_millis(500));
        let endpoints = Endpoints::new("http://127.0.0.1:9/", "quickedit_image").expect("valid base");
        let field = "node/1/field_image/en/full".parse().expect("field id should parse");
        let ticket = RequestTicket::next();

        transport
            .send(
                ticket,
                BackendRequest::FetchMetadata {
                    url: endpoints.info_url(&field).expect("url"),
                },
            )
            .expect("request thread should start");

        let completion = completions
            .recv_timeout(Duration::from_secs(10))
            .expect("completion should arrive");
        assert_eq!(completion.ticket, ticket);
        assert!(completion.result.is_err());
    }
}
