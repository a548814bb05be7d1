use reqwest::StatusCode;

use super::command::ServiceCommand;
use crate::classifier::{ResponseClass, ServiceError};
use crate::http::HttpResponse;
use crate::models::{DataModel, DecoderRegistry};

/// A command paired with the response the service returned for it.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    command: ServiceCommand,
    response: HttpResponse,
    status_description: String,
}

impl ServiceResponse {
    pub fn new(
        command: ServiceCommand,
        response: HttpResponse,
        status_description: impl Into<String>,
    ) -> Self {
        Self {
            command,
            response,
            status_description: status_description.into(),
        }
    }

    pub fn command(&self) -> &ServiceCommand {
        &self.command
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn status_description(&self) -> &str {
        &self.status_description
    }

    pub fn was_error(&self) -> bool {
        ResponseClass::from(self.response.status()).is_error()
    }

    /// The classified service error, for 4xx/5xx responses.
    pub fn error(&self) -> Option<ServiceError> {
        self.was_error()
            .then(|| ServiceError::from_response(&self.response))
    }

    /// Decodes the body as the command's expected result kind.
    ///
    /// Error responses decode as [`DataModel::Error`] regardless of the kind
    /// the command asked for, and an empty body decodes as
    /// [`DataModel::None`].
    pub fn data_model(&self, registry: &DecoderRegistry) -> crate::Result<DataModel> {
        if let Some(err) = self.error() {
            return Ok(DataModel::Error(err.response().clone()));
        }
        if self.response.body().is_empty() {
            return Ok(DataModel::None);
        }
        registry.decode(self.command.response_kind(), self.response.body())
    }

    pub fn into_result(self) -> crate::Result<HttpResponse> {
        match self.error() {
            Some(err) => Err(err.into()),
            None => Ok(self.response),
        }
    }
}
