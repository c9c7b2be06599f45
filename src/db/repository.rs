//! User repository: the storage seam behind the auth and users routes.

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    error::{ErrorKind, WriteFailure},
    options::ReturnDocument,
    Collection,
};
use serde::{Deserialize, Serialize};

use super::{DbHandle, USERS_COLLECTION};
use crate::errors::AppError;
use crate::models::{NewUser, User, UserChanges};

/// MongoDB duplicate key error code.
const DUPLICATE_KEY: i32 = 11000;

/// Storage operations on users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// List all users, oldest first.
    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    /// Get a user by ID. Malformed IDs are reported as absent.
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    /// Get a user by normalised e-mail.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Insert a user. Fails with `Conflict` if the e-mail is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    /// Apply a partial update and return the updated user.
    async fn update_user(&self, id: &str, changes: UserChanges) -> Result<User, AppError>;

    /// Delete a user. Fails with `NotFound` if absent.
    async fn delete_user(&self, id: &str) -> Result<(), AppError>;
}

/// Document shape of the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.id.to_hex(),
            name: doc.name,
            email: doc.email,
            password_hash: doc.password,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// `UserRepository` backed by the `users` collection.
#[derive(Clone)]
pub struct MongoUserRepository {
    db: DbHandle,
}

impl MongoUserRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    fn collection(&self) -> Result<Collection<UserDocument>, AppError> {
        self.db
            .get()
            .map(|db| db.collection::<UserDocument>(USERS_COLLECTION))
            .ok_or_else(|| AppError::ServiceUnavailable("Database is not connected".to_string()))
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let cursor = self
            .collection()?
            .find(doc! {})
            .sort(doc! { "createdAt": 1 })
            .await?;
        let docs: Vec<UserDocument> = cursor.try_collect().await?;

        Ok(docs.into_iter().map(User::from).collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let collection = self.collection()?;
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        let doc = collection.find_one(doc! { "_id": oid }).await?;
        Ok(doc.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let doc = self
            .collection()?
            .find_one(doc! { "email": email })
            .await?;
        Ok(doc.map(User::from))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let now = Utc::now().to_rfc3339();
        let doc = UserDocument {
            id: ObjectId::new(),
            name: user.name,
            email: user.email,
            password: user.password_hash,
            created_at: now.clone(),
            updated_at: now,
        };

        self.collection()?
            .insert_one(&doc)
            .await
            .map_err(map_duplicate_email)?;

        Ok(doc.into())
    }

    async fn update_user(&self, id: &str, changes: UserChanges) -> Result<User, AppError> {
        let collection = self.collection()?;
        let oid = ObjectId::parse_str(id)
            .map_err(|_| AppError::NotFound(format!("User {} not found", id)))?;

        let mut set = Document::new();
        if let Some(name) = changes.name {
            set.insert("name", name);
        }
        if let Some(email) = changes.email {
            set.insert("email", email);
        }
        if let Some(password) = changes.password_hash {
            set.insert("password", password);
        }
        set.insert("updatedAt", Utc::now().to_rfc3339());

        let updated = collection
            .find_one_and_update(doc! { "_id": oid }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_duplicate_email)?;

        updated
            .map(User::from)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn delete_user(&self, id: &str) -> Result<(), AppError> {
        let collection = self.collection()?;
        let oid = ObjectId::parse_str(id)
            .map_err(|_| AppError::NotFound(format!("User {} not found", id)))?;

        let result = collection.delete_one(doc! { "_id": oid }).await?;
        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }
}

fn map_duplicate_email(err: mongodb::error::Error) -> AppError {
    if is_duplicate_key(&err) {
        return AppError::Conflict("User already exists".to_string());
    }
    err.into()
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => false,
    }
}
