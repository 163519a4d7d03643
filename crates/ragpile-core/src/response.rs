//! Response validation.
//!
//! Every call into the collaborator API passes its response through
//! [`ensure_success`] before reading the body.

use crate::error::{Error, Result};
use reqwest::{Response, StatusCode};

/// Classify a status code. Any 2xx is a success.
pub fn check_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::from_status(status))
    }
}

/// Return the response unchanged on success, or fail with [`Error::Response`].
///
/// A failed response is terminal for that call; the body is left unread.
pub fn ensure_success(response: Response) -> Result<Response> {
    match check_status(response.status()) {
        Ok(()) => Ok(response),
        Err(err) => {
            log::debug!("{} {} -> {}", response.url(), response.status(), err);
            Err(err)
        }
    }
}
