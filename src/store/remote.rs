//! JSON-over-HTTP store that talks to another instance's `/api` routes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::*;

use super::{Store, StoreError};

pub struct RemoteStore {
    client: Client,
    base: Url,
}

impl RemoteStore {
    /// `base` is the upstream origin, e.g. `http://10.0.0.5:3001/`.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, StoreError> {
        self.base
            .join(path)
            .map_err(|e| StoreError::Unavailable(format!("bad upstream path {path}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let response = self.client.get(self.url(path)?).send().await.map_err(map_transport_error)?;
        decode(check_status(response).await?).await
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(response).await.map(drop)
    }
}

fn map_transport_error(e: reqwest::Error) -> StoreError {
    if e.is_decode() {
        StoreError::Decode(e.to_string())
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(StoreError::Unavailable(format!("upstream {status}: {message}")));
    }
    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let body = response.bytes().await.map_err(map_transport_error)?;
    serde_json::from_slice(&body).map_err(|e| StoreError::Decode(e.to_string()))
}

#[async_trait]
impl Store for RemoteStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.get_json("api/users").await
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        self.get_json("api/courses").await
    }

    async fn add_course(&self, course: Course) -> Result<(), StoreError> {
        self.post_json("api/courses", &course).await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        self.get_json("api/bookings").await
    }

    async fn add_booking(&self, booking: Booking) -> Result<(), StoreError> {
        self.post_json("api/bookings", &booking).await
    }

    async fn delete_booking(&self, id: &str) -> Result<(), StoreError> {
        let mut url = self.url("api/bookings/")?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Unavailable("upstream url cannot be a base".into()))?
            .pop_if_empty()
            .push(id);
        let response = self.client.delete(url).send().await.map_err(map_transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await.map(drop)
    }

    async fn get_admin_settings(&self) -> Result<AdminSettings, StoreError> {
        self.get_json("api/admin/settings").await
    }

    async fn save_admin_settings(&self, settings: AdminSettings) -> Result<(), StoreError> {
        self.post_json("api/admin/settings", &settings).await
    }
}
