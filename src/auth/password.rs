use crate::error::{AppError, AppResult};

pub fn hash(password: &str, cost: u32) -> AppResult<String> {
    Ok(bcrypt::hash(password, cost)?)
}

/// False for a wrong password or an unparseable hash.
pub fn verify(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// `hash` off the async runtime; bcrypt is deliberately slow.
pub async fn hash_blocking(password: String, cost: u32) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hash task: {}", e)))?
}

pub async fn verify_blocking(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || verify(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify task: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hashed = hash("correct horse", 4).unwrap();
        assert!(hashed.starts_with("$2"));
        assert!(verify("correct horse", &hashed));
        assert!(!verify("battery staple", &hashed));
        assert!(!verify("anything", "not-a-hash"));
    }

    #[tokio::test]
    async fn blocking_variants_agree() {
        let hashed = hash_blocking("secret-pass".into(), 4).await.unwrap();
        assert!(verify_blocking("secret-pass".into(), hashed.clone()).await.unwrap());
        assert!(!verify_blocking("wrong".into(), hashed).await.unwrap());
    }
}
