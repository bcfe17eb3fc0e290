use std::sync::Arc;

use tokio::sync::RwLock;

use super::StoreContext;
use crate::error::{ClientError, ClientResult};
use crate::models::{ChildProfile, NewChild};

/// The parent's child profiles. Appointments and the checkout only refer
/// to them by id.
#[derive(Clone)]
pub struct ChildStore {
    ctx: StoreContext,
    children: Arc<RwLock<Vec<ChildProfile>>>,
}

impl ChildStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            children: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn children(&self) -> Vec<ChildProfile> {
        self.children.read().await.clone()
    }

    pub async fn fetch_all(&self, user_id: &str) {
        let result = match self.ctx.session.current() {
            Some(session) => {
                self.ctx
                    .call(self.ctx.backend.fetch_children(&session.token, user_id))
                    .await
            }
            None => Err(ClientError::please_log_in()),
        };

        let mut children = self.children.write().await;
        match result {
            Ok(list) => *children = list,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "fetch children failed");
                children.clear();
            }
        }
    }

    pub async fn create(&self, child: NewChild) -> ClientResult<ChildProfile> {
        self.validate(&child.children_name, child.date_of_birth, child.gender.as_deref())?;
        let session = self.ctx.require_session()?;

        let created = self
            .ctx
            .call(self.ctx.backend.create_child(&session.token, &session.user_id, &child))
            .await?;
        self.children.write().await.push(created.clone());
        tracing::info!(children_id = %created.children_id, "child profile created");
        Ok(created)
    }

    pub async fn update(&self, child: ChildProfile) -> ClientResult<ChildProfile> {
        self.validate(&child.children_name, Some(child.date_of_birth), Some(child.gender.as_str()))?;
        let session = self.ctx.require_session()?;

        let updated = self
            .ctx
            .call(self.ctx.backend.update_child(&session.token, &child))
            .await?;
        let mut children = self.children.write().await;
        if let Some(slot) = children.iter_mut().find(|c| c.children_id == updated.children_id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    pub async fn delete(&self, children_id: &str) -> ClientResult<()> {
        let session = self.ctx.require_session()?;
        self.ctx
            .call(self.ctx.backend.delete_child(&session.token, children_id))
            .await?;
        self.children.write().await.retain(|c| c.children_id != children_id);
        tracing::info!(children_id, "child profile deleted");
        Ok(())
    }

    fn validate(&self, name: &str, dob: Option<chrono::NaiveDate>, gender: Option<&str>) -> ClientResult<()> {
        if name.trim().is_empty() {
            return Err(ClientError::validation("childrenName", "Please enter the child's name"));
        }
        match dob {
            None => return Err(ClientError::validation("dateOfBirth", "Please enter the child's date of birth")),
            Some(d) if d > self.ctx.today() => {
                return Err(ClientError::validation("dateOfBirth", "Date of birth cannot be in the future"));
            }
            Some(_) => {}
        }
        if gender.map(str::trim).unwrap_or("").is_empty() {
            return Err(ClientError::validation("gender", "Please choose the child's gender"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::session::StaticSession;

    fn setup() -> (Arc<FakeBackend>, ChildStore) {
        let fake = Arc::new(FakeBackend::default());
        let ctx = StoreContext::new(
            fake.clone(),
            Arc::new(StaticSession::logged_in("U1", "tok")),
            Duration::from_secs(5),
        )
        .with_today(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        (fake, ChildStore::new(ctx))
    }

    fn na() -> NewChild {
        NewChild {
            children_name: "Bé Na".into(),
            date_of_birth: NaiveDate::from_ymd_opt(2025, 3, 1),
            gender: Some("Nữ".into()),
            medical_issue: None,
        }
    }

    #[tokio::test]
    async fn crud_keeps_local_list_in_step() {
        let (fake, store) = setup();

        let created = store.create(na()).await.unwrap();
        assert_eq!(store.children().await, vec![created.clone()]);

        let mut renamed = created.clone();
        renamed.children_name = "Bé Na Na".into();
        store.update(renamed.clone()).await.unwrap();
        assert_eq!(store.children().await[0].children_name, "Bé Na Na");

        store.fetch_all("U1").await;
        assert_eq!(store.children().await, vec![renamed]);

        store.delete(&created.children_id).await.unwrap();
        assert!(store.children().await.is_empty());
        assert_eq!(fake.calls("delete_child"), 1);
    }

    #[tokio::test]
    async fn invalid_profile_never_reaches_backend() {
        let (fake, store) = setup();
        let future_dob = NewChild {
            date_of_birth: NaiveDate::from_ymd_opt(2027, 1, 1),
            ..na()
        };
        let err = store.create(future_dob).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "dateOfBirth", .. }));
        assert_eq!(fake.total_calls(), 0);
    }

    #[tokio::test]
    async fn failed_delete_keeps_profile() {
        let (fake, store) = setup();
        let created = store.create(na()).await.unwrap();
        fake.fail_with(ClientError::Backend {
            status: 409,
            code: "HAS_APPOINTMENTS".into(),
            message: "child has upcoming appointments".into(),
        });
        let err = store.delete(&created.children_id).await.unwrap_err();
        assert_eq!(err.code(), "HAS_APPOINTMENTS");
        assert_eq!(store.children().await.len(), 1);
    }
}
