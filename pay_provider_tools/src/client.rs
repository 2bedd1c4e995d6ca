use log::*;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::ProviderApiError;

/// Builds a client that sends `headers` (plus a JSON content type) with every request.
pub(crate) fn build_client(headers: &[(&'static str, &str)]) -> Result<Client, ProviderApiError> {
    let mut map = HeaderMap::with_capacity(headers.len() + 1);
    for (name, value) in headers {
        let val = HeaderValue::from_str(value).map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        map.insert(HeaderName::from_static(name), val);
    }
    map.insert("content-type", HeaderValue::from_static("application/json"));
    Client::builder().default_headers(map).build().map_err(|e| ProviderApiError::Initialization(e.to_string()))
}

pub(crate) async fn post_json<T: DeserializeOwned, B: Serialize>(
    client: &Client,
    url: &str,
    body: &B,
) -> Result<T, ProviderApiError> {
    trace!("Sending REST query: POST {url}");
    let response =
        client.post(url).json(body).send().await.map_err(|e| ProviderApiError::RestRequestError(e.to_string()))?;
    if response.status().is_success() {
        trace!("REST query successful. {}", response.status());
        response.json::<T>().await.map_err(|e| ProviderApiError::JsonError(e.to_string()))
    } else {
        let status = response.status().as_u16();
        let message = response.text().await.map_err(|e| ProviderApiError::RestResponseError(e.to_string()))?;
        Err(ProviderApiError::QueryError { status, message })
    }
}
