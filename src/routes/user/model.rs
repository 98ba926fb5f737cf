use serde::Deserialize;

// GET /fetchUserData?username=...
#[derive(Debug, Deserialize)]
pub struct FetchUserDataQuery {
    pub username: Option<String>,
}
