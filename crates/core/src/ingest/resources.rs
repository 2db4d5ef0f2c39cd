//! Typed calls for each backend resource.

use crate::auth::Credentials;
use crate::domain::account::{
    Ack, ChatReply, ChatRequest, LoginRequest, LoginResponse, OtpRequest, OtpVerification,
    PasswordReset, ProfileEnvelope, ProfileUpdate, Registration, UserProfile,
};
use crate::domain::records::{
    Animal, AnimalUpdate, FeedEntry, FeedRecord, HealthEntry, HealthKind, HealthRecord, MilkEntry,
    MilkRecord, NewAnimal,
};
use crate::ingest::client::DairyApiClient;
use crate::ingest::error::FetchError;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// Record collections the backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Animals,
    Feed,
    Milk,
    Health(HealthKind),
}

impl Resource {
    /// Path listing every record.
    pub fn list_path(self) -> String {
        match self {
            Resource::Milk => "/api/milk-production/all".to_string(),
            other => other.collection_path(),
        }
    }

    /// Path new records are posted to.
    pub fn collection_path(self) -> String {
        match self {
            Resource::Animals => "/api/animals".to_string(),
            Resource::Feed => "/api/feed-management".to_string(),
            Resource::Milk => "/api/milk-production".to_string(),
            Resource::Health(kind) => format!("/api/{}", kind.resource()),
        }
    }

    pub fn item_path(self, id: &str) -> String {
        format!("{}/{}", self.collection_path(), id.trim())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Animals => f.write_str("animals"),
            Resource::Feed => f.write_str("feed"),
            Resource::Milk => f.write_str("milk"),
            Resource::Health(kind) => write!(f, "{kind}"),
        }
    }
}

/// Mutations answer with `{success, message}`, the stored document, or nothing.
fn into_ack(v: Value) -> Result<Ack, FetchError> {
    if v.is_null() {
        return Ok(Ack::default());
    }
    let ack: Ack = serde_json::from_value(v).map_err(|e| FetchError::Malformed(e.to_string()))?;
    if !ack.success {
        return Err(FetchError::Server {
            status: 200,
            message: ack.message,
        });
    }
    Ok(ack)
}

fn ensure_id(id: &str) -> Result<&str, FetchError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(FetchError::Validation(
            crate::validate::ValidationErrors::single("id", "Record id is required"),
        ));
    }
    Ok(id)
}

impl DairyApiClient {
    async fn list<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        resource: Resource,
    ) -> Result<Vec<T>, FetchError> {
        self.get_json(&resource.list_path(), Some(credentials)).await
    }

    async fn mutate<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        credentials: &Credentials,
        body: Option<&B>,
    ) -> Result<Ack, FetchError> {
        let v: Value = self
            .send_json(method, path, Some(credentials), body)
            .await?;
        into_ack(v)
    }

    async fn create<B: Serialize + ?Sized>(
        &self,
        credentials: &Credentials,
        resource: Resource,
        body: &B,
    ) -> Result<Ack, FetchError> {
        self.mutate(Method::POST, &resource.collection_path(), credentials, Some(body))
            .await
    }

    async fn update<B: Serialize + ?Sized>(
        &self,
        credentials: &Credentials,
        resource: Resource,
        id: &str,
        body: &B,
    ) -> Result<Ack, FetchError> {
        let id = ensure_id(id)?;
        self.mutate(Method::PUT, &resource.item_path(id), credentials, Some(body))
            .await
    }

    pub async fn delete(
        &self,
        credentials: &Credentials,
        resource: Resource,
        id: &str,
    ) -> Result<Ack, FetchError> {
        let id = ensure_id(id)?;
        self.mutate::<()>(Method::DELETE, &resource.item_path(id), credentials, None)
            .await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, FetchError> {
        let res: LoginResponse = self
            .send_json(Method::POST, "/api/auth/login", None, Some(request))
            .await?;
        if res.token.trim().is_empty() {
            return Err(FetchError::Malformed("login response has no token".to_string()));
        }
        Ok(res)
    }

    pub async fn register(&self, registration: &Registration) -> Result<Ack, FetchError> {
        let v: Value = self
            .send_json(Method::POST, "/api/auth/register", None, Some(registration))
            .await?;
        into_ack(v)
    }

    /// Checks that the backend still accepts the token and returns its user.
    pub async fn verify(&self, credentials: &Credentials) -> Result<Value, FetchError> {
        self.get_json("/api/auth/verify", Some(credentials)).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Ack, FetchError> {
        let body = json!({ "email": email.trim() });
        let v: Value = self
            .send_json(Method::POST, "/api/auth/forgot-password", None, Some(&body))
            .await?;
        into_ack(v)
    }

    pub async fn verify_otp(&self, request: &OtpRequest) -> Result<OtpVerification, FetchError> {
        self.send_json(Method::POST, "/api/auth/verify-otp", None, Some(request))
            .await
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<Ack, FetchError> {
        let v: Value = self
            .send_json(Method::POST, "/api/auth/reset-password", None, Some(reset))
            .await?;
        into_ack(v)
    }

    pub async fn profile(&self, credentials: &Credentials) -> Result<UserProfile, FetchError> {
        let envelope: ProfileEnvelope = self
            .get_json("/api/auth/profile", Some(credentials))
            .await?;
        Ok(envelope.user)
    }

    pub async fn update_profile(
        &self,
        credentials: &Credentials,
        update: &ProfileUpdate,
    ) -> Result<Ack, FetchError> {
        self.mutate(Method::PUT, "/api/auth/profile", credentials, Some(update))
            .await
    }

    pub async fn delete_account(&self, credentials: &Credentials) -> Result<Ack, FetchError> {
        self.mutate::<()>(Method::DELETE, "/api/auth/delete-account", credentials, None)
            .await
    }

    pub async fn animals(&self, credentials: &Credentials) -> Result<Vec<Animal>, FetchError> {
        self.list(credentials, Resource::Animals).await
    }

    pub async fn add_animal(
        &self,
        credentials: &Credentials,
        animal: NewAnimal,
    ) -> Result<Ack, FetchError> {
        let image = Part::bytes(animal.image.bytes)
            .file_name(animal.image.file_name)
            .mime_str(&animal.image.mime)
            .map_err(|e| FetchError::Malformed(format!("invalid image type: {e}")))?;
        let form = Form::new()
            .text("tagId", animal.tag_id)
            .text("breed", animal.breed)
            .part("image", image);
        let v: Value = self
            .send_multipart("/api/animals/add-with-image", credentials, form)
            .await?;
        into_ack(v)
    }

    pub async fn update_animal(
        &self,
        credentials: &Credentials,
        id: &str,
        update: &AnimalUpdate,
    ) -> Result<Ack, FetchError> {
        self.update(credentials, Resource::Animals, id, update).await
    }

    pub async fn feeds(&self, credentials: &Credentials) -> Result<Vec<FeedRecord>, FetchError> {
        self.list(credentials, Resource::Feed).await
    }

    pub async fn add_feed(
        &self,
        credentials: &Credentials,
        entry: &FeedEntry,
    ) -> Result<Ack, FetchError> {
        self.create(credentials, Resource::Feed, entry).await
    }

    pub async fn update_feed(
        &self,
        credentials: &Credentials,
        id: &str,
        entry: &FeedEntry,
    ) -> Result<Ack, FetchError> {
        self.update(credentials, Resource::Feed, id, entry).await
    }

    pub async fn milk_records(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<MilkRecord>, FetchError> {
        self.list(credentials, Resource::Milk).await
    }

    pub async fn add_milk(
        &self,
        credentials: &Credentials,
        entry: &MilkEntry,
    ) -> Result<Ack, FetchError> {
        self.create(credentials, Resource::Milk, entry).await
    }

    pub async fn update_milk(
        &self,
        credentials: &Credentials,
        id: &str,
        entry: &MilkEntry,
    ) -> Result<Ack, FetchError> {
        self.update(credentials, Resource::Milk, id, entry).await
    }

    pub async fn health_records(
        &self,
        credentials: &Credentials,
        kind: HealthKind,
    ) -> Result<Vec<HealthRecord>, FetchError> {
        self.list(credentials, Resource::Health(kind)).await
    }

    pub async fn add_health_record(
        &self,
        credentials: &Credentials,
        kind: HealthKind,
        entry: &HealthEntry,
    ) -> Result<Ack, FetchError> {
        self.create(credentials, Resource::Health(kind), entry).await
    }

    pub async fn update_health_record(
        &self,
        credentials: &Credentials,
        kind: HealthKind,
        id: &str,
        entry: &HealthEntry,
    ) -> Result<Ack, FetchError> {
        self.update(credentials, Resource::Health(kind), id, entry)
            .await
    }

    pub async fn generate(
        &self,
        credentials: &Credentials,
        request: &ChatRequest,
    ) -> Result<ChatReply, FetchError> {
        self.send_json(
            Method::POST,
            "/api/gemini/generate",
            Some(credentials),
            Some(request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_paths() {
        assert_eq!(Resource::Milk.list_path(), "/api/milk-production/all");
        assert_eq!(Resource::Milk.collection_path(), "/api/milk-production");
        assert_eq!(Resource::Feed.item_path("f1"), "/api/feed-management/f1");
        assert_eq!(
            Resource::Health(HealthKind::Vaccination).list_path(),
            "/api/vaccinations"
        );
        assert_eq!(Resource::Animals.item_path(" a1 "), "/api/animals/a1");
    }

    #[test]
    fn acks_from_varied_mutation_bodies() {
        assert!(into_ack(Value::Null).unwrap().success);
        assert!(into_ack(json!({"_id": "f1", "name": "Hay"})).unwrap().success);
        let err = into_ack(json!({"success": false, "message": "Duplicate tag"})).unwrap_err();
        assert_eq!(err.user_message(), "Duplicate tag");
    }

    #[test]
    fn blank_ids_are_rejected_before_any_request() {
        assert!(matches!(ensure_id("  "), Err(FetchError::Validation(_))));
        assert_eq!(ensure_id(" a1").unwrap(), "a1");
    }
}
