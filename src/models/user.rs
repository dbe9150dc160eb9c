use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

/// Where an account came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Credentials,
    Google,
    Github,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Credentials => "credentials",
            AuthProvider::Google => "google",
            AuthProvider::Github => "github",
        }
    }

    /// Parses an OAuth provider path segment. `credentials` is not an OAuth provider.
    pub fn oauth_from_str(s: &str) -> Option<Self> {
        match s {
            "google" => Some(AuthProvider::Google),
            "github" => Some(AuthProvider::Github),
            _ => None,
        }
    }
}

/// Document in the "users" collection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub email: String,
    /// bcrypt hash
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub verify_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub verify_code_expires: Option<BsonDateTime>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default = "default_true")]
    pub is_accepting_messages: bool,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default = "default_provider")]
    pub provider: AuthProvider,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<BsonDateTime>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<BsonDateTime>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub content: String,
    pub created_at: BsonDateTime,
}

fn default_true() -> bool {
    true
}

fn default_provider() -> AuthProvider {
    AuthProvider::Credentials
}

impl User {
    pub fn id_hex(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

/// Public view of a user, safe to return from the API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
    pub provider: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id_hex(),
            username: user.username.clone(),
            email: user.email.clone(),
            is_verified: user.is_verified,
            provider: user.provider.as_str().to_string(),
        }
    }
}
