use anyhow::anyhow;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use uuid::Uuid;

use crate::app::error::{CoreError, CoreResult};
use crate::app::users::UserService;
use crate::domain::user::CurrentUser;
use crate::infra::db::Db;

pub const TOKEN_ISSUER: &str = "perpetua";
pub const TOKEN_AUDIENCE: &str = "perpetua";

/// Resolves an access credential to the calling user.
///
/// Tokens are v4.local PASETOs minted by the external auth service with a
/// shared symmetric key; this side only verifies them.
#[derive(Clone)]
pub struct IdentityService {
    db: Db,
    access_key: [u8; 32],
}

impl IdentityService {
    pub fn new(db: Db, access_key: [u8; 32]) -> Self {
        Self { db, access_key }
    }

    /// `Ok(None)` means the credential is not valid or names no live user.
    pub async fn resolve(&self, token: &str) -> CoreResult<Option<CurrentUser>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "access") {
            return Ok(None);
        }
        let user_id = match claim_uuid(&claims, "sub") {
            Some(user_id) => user_id,
            None => return Ok(None),
        };

        let user = UserService::new(self.db.clone()).get_user(user_id).await?;
        Ok(user.map(|user| CurrentUser {
            user_id: user.id,
            account_created_at: user.created_at,
        }))
    }

    /// Like `resolve`, but a missing or dead credential is `Unauthorized`.
    pub async fn authenticate(&self, token: &str) -> CoreResult<CurrentUser> {
        self.resolve(token).await?.ok_or(CoreError::Unauthorized)
    }

    fn decrypt_claims(&self, token: &str) -> CoreResult<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.access_key)
            .map_err(|err| anyhow!("invalid access key: {:?}", err))?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_AUDIENCE);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

fn claim_uuid(claims: &Claims, name: &str) -> Option<Uuid> {
    claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .and_then(|value| Uuid::parse_str(value).ok())
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
