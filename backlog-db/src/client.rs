use crate::{
    config::MongoConfig,
    query,
    record::{BookmarkRecord, CommentRecord, IdeaRecord, LikeRecord, ProjectRecord},
    schema::{
        BOOKMARKS_COLLECTION, COMMENTS_COLLECTION, IDEAS_COLLECTION, LIKES_COLLECTION,
        PROJECTS_COLLECTION, indexes,
    },
};
use backlog_common::{
    model::{
        Id, ModelValidationError,
        comment::{Comment, CommentContent, CommentMarker},
        idea::{Idea, IdeaFilter, IdeaMarker, IdeaSort},
        project::Project,
        user::UserId,
    },
    pagination::{Page, PageRequest},
    util::PositiveDuration,
};
use bson::{Document, doc, oid::ObjectId};
use futures::{FutureExt, TryStreamExt};
use mongodb::{
    Client, Collection, Database,
    error::{ErrorKind, WriteError, WriteFailure},
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A document could not be decoded: {0}")]
    Decode(#[from] bson::de::Error),
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Whether a like/bookmark style mutation changed anything.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Toggle {
    Changed,
    Unchanged,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum CommentDeletion {
    Deleted,
    NotFound,
    NotAuthor,
}

struct FingerprintContext<R: Send + Sync> {
    records: Collection<R>,
    ideas: Collection<IdeaRecord>,
    user_id: UserId,
    idea_id: ObjectId,
}

/// The idea repository: the only writer of ideas, likes, comments and bookmarks.
#[derive(Clone, Debug)]
pub struct DbClient {
    client: Client,
    database: Database,
    operation_timeout: PositiveDuration,
}

impl DbClient {
    /// Wraps an existing client. The client connects lazily.
    #[must_use]
    pub fn new(client: Client, database: &str, operation_timeout: PositiveDuration) -> Self {
        let database = client.database(database);

        Self {
            client,
            database,
            operation_timeout,
        }
    }

    /// Connects to the configured deployment and checks that it answers.
    pub async fn connect(config: &MongoConfig, operation_timeout: PositiveDuration) -> Result<Self> {
        info!(
            protocol = %config.protocol,
            host = %config.host,
            database = %config.database,
            "Connecting to MongoDB"
        );

        let options = config.client_options().await?;
        let client = Client::with_options(options)?;
        let db_client = Self::new(client, &config.database, operation_timeout);

        db_client.ping().await?;
        info!(database = %config.database, "Connected to MongoDB");

        Ok(db_client)
    }

    pub async fn ping(&self) -> Result<()> {
        self.timed(async {
            self.database.run_command(doc! { "ping": 1 }).await?;
            Ok(())
        })
        .await
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        for (collection, models) in indexes() {
            debug!(collection, count = models.len(), "Ensuring indexes");
            self.timed(async {
                self.database
                    .collection::<Document>(collection)
                    .create_indexes(models)
                    .await?;
                Ok(())
            })
            .await?;
        }

        Ok(())
    }

    /// Closes connections once outstanding sessions and cursors are gone.
    pub async fn shutdown(&self) {
        self.client.clone().shutdown().await;
    }

    fn ideas(&self) -> Collection<IdeaRecord> {
        self.database.collection(IDEAS_COLLECTION)
    }

    fn likes(&self) -> Collection<LikeRecord> {
        self.database.collection(LIKES_COLLECTION)
    }

    fn comments(&self) -> Collection<CommentRecord> {
        self.database.collection(COMMENTS_COLLECTION)
    }

    fn bookmarks(&self) -> Collection<BookmarkRecord> {
        self.database.collection(BOOKMARKS_COLLECTION)
    }

    fn projects(&self) -> Collection<ProjectRecord> {
        self.database.collection(PROJECTS_COLLECTION)
    }

    async fn timed<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.operation_timeout.get();

        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, "Database operation timed out");
                Err(DbError::Timeout(timeout))
            }
        }
    }

    async fn idea_exists(&self, idea_id: ObjectId) -> Result<bool> {
        let count = self.ideas().count_documents(query::by_id(idea_id)).await?;
        Ok(count > 0)
    }

    pub async fn fetch_ideas(
        &self,
        filter: &IdeaFilter,
        sort: IdeaSort,
        page: PageRequest,
    ) -> Result<Page<Idea>> {
        let filter = query::idea_filter(filter);

        self.timed(async {
            let total_items = self.ideas().count_documents(filter.clone()).await?;

            let records: Vec<IdeaRecord> = self
                .ideas()
                .find(filter)
                .sort(query::idea_sort(sort))
                .skip(page.skip())
                .limit(page.page_size().cast_signed())
                .await?
                .try_collect()
                .await?;

            let items = records
                .into_iter()
                .map(Idea::try_from)
                .collect::<Result<_, _>>()?;

            Ok(Page { items, total_items })
        })
        .await
    }

    pub async fn fetch_idea(&self, idea_id: Id<IdeaMarker>) -> Result<Option<Idea>> {
        self.timed(async {
            let mut cursor = self
                .ideas()
                .aggregate(query::idea_with_details(idea_id.object_id()))
                .await?;

            let Some(document) = cursor.try_next().await? else {
                return Ok(None);
            };
            let record: IdeaRecord = bson::from_document(document)?;

            Ok(Some(Idea::try_from(record)?))
        })
        .await
    }

    /// Records a like and bumps the idea's counter in one transaction.
    ///
    /// Returns `None` when the idea does not exist.
    pub async fn like_idea(
        &self,
        user_id: &UserId,
        idea_id: Id<IdeaMarker>,
    ) -> Result<Option<Toggle>> {
        let context = FingerprintContext {
            records: self.likes(),
            ideas: self.ideas(),
            user_id: user_id.clone(),
            idea_id: idea_id.object_id(),
        };

        let outcome = self
            .timed(async {
                let mut session = self.client.start_session().await?;

                let outcome = session
                    .start_transaction()
                    .and_run(context, |session, context| {
                        async move {
                            let fingerprint = query::fingerprint(&context.user_id, context.idea_id);
                            let existing = context
                                .records
                                .count_documents(fingerprint)
                                .session(&mut *session)
                                .await?;
                            if existing > 0 {
                                return Ok(Some(Toggle::Unchanged));
                            }

                            let (filter, update) =
                                query::counter_update(context.idea_id, "likes_count", 1);
                            let updated = context
                                .ideas
                                .update_one(filter, update)
                                .session(&mut *session)
                                .await?;
                            if updated.matched_count == 0 {
                                return Ok(None);
                            }

                            let like =
                                LikeRecord::new(context.user_id.get().to_owned(), context.idea_id);
                            context
                                .records
                                .insert_one(like)
                                .session(&mut *session)
                                .await?;

                            Ok(Some(Toggle::Changed))
                        }
                        .boxed()
                    })
                    .await?;

                Ok(outcome)
            })
            .await?;

        debug!(%user_id, %idea_id, ?outcome, "Like idea");
        Ok(outcome)
    }

    /// Removes a like and decrements the idea's counter in one transaction.
    pub async fn unlike_idea(&self, user_id: &UserId, idea_id: Id<IdeaMarker>) -> Result<Toggle> {
        let context = FingerprintContext {
            records: self.likes(),
            ideas: self.ideas(),
            user_id: user_id.clone(),
            idea_id: idea_id.object_id(),
        };

        let outcome = self
            .timed(async {
                let mut session = self.client.start_session().await?;

                let outcome = session
                    .start_transaction()
                    .and_run(context, |session, context| {
                        async move {
                            let fingerprint = query::fingerprint(&context.user_id, context.idea_id);
                            let deleted = context
                                .records
                                .delete_one(fingerprint)
                                .session(&mut *session)
                                .await?;
                            if deleted.deleted_count == 0 {
                                return Ok(Toggle::Unchanged);
                            }

                            let (filter, update) =
                                query::counter_update(context.idea_id, "likes_count", -1);
                            context
                                .ideas
                                .update_one(filter, update)
                                .session(&mut *session)
                                .await?;

                            Ok(Toggle::Changed)
                        }
                        .boxed()
                    })
                    .await?;

                Ok(outcome)
            })
            .await?;

        debug!(%user_id, %idea_id, ?outcome, "Unlike idea");
        Ok(outcome)
    }

    /// Returns `None` when the idea does not exist.
    pub async fn bookmark_idea(
        &self,
        user_id: &UserId,
        idea_id: Id<IdeaMarker>,
    ) -> Result<Option<Toggle>> {
        let idea_id = idea_id.object_id();

        self.timed(async {
            if !self.idea_exists(idea_id).await? {
                return Ok(None);
            }

            let fingerprint = query::fingerprint(user_id, idea_id);
            if self.bookmarks().count_documents(fingerprint).await? > 0 {
                return Ok(Some(Toggle::Unchanged));
            }

            let bookmark = BookmarkRecord::new(user_id.get().to_owned(), idea_id);
            match self.bookmarks().insert_one(bookmark).await {
                Ok(_) => Ok(Some(Toggle::Changed)),
                // Lost a race against an identical request.
                Err(err) if is_duplicate_key(&err) => Ok(Some(Toggle::Unchanged)),
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    pub async fn unbookmark_idea(
        &self,
        user_id: &UserId,
        idea_id: Id<IdeaMarker>,
    ) -> Result<Toggle> {
        self.timed(async {
            let deleted = self
                .bookmarks()
                .delete_one(query::fingerprint(user_id, idea_id.object_id()))
                .await?;

            Ok(if deleted.deleted_count == 0 {
                Toggle::Unchanged
            } else {
                Toggle::Changed
            })
        })
        .await
    }

    pub async fn fetch_bookmarked_ideas(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<Page<Idea>> {
        self.timed(async {
            let documents: Vec<Document> = self
                .bookmarks()
                .aggregate(query::bookmarked_ideas(user_id, page))
                .await?
                .try_collect()
                .await?;

            let items = documents
                .into_iter()
                .map(|document| -> Result<Idea> {
                    let record: IdeaRecord = bson::from_document(document)?;
                    Ok(Idea::try_from(record)?)
                })
                .collect::<Result<_>>()?;

            let total_items = self
                .bookmarks()
                .count_documents(doc! { "user_id": user_id.get() })
                .await?;

            Ok(Page { items, total_items })
        })
        .await
    }

    /// Returns `None` when the idea does not exist.
    pub async fn fetch_idea_comments(
        &self,
        idea_id: Id<IdeaMarker>,
        page: PageRequest,
    ) -> Result<Option<Page<Comment>>> {
        let idea_id = idea_id.object_id();

        self.timed(async {
            if !self.idea_exists(idea_id).await? {
                return Ok(None);
            }

            let filter = query::comments_of(idea_id);
            let total_items = self.comments().count_documents(filter.clone()).await?;

            let records: Vec<CommentRecord> = self
                .comments()
                .find(filter)
                .sort(doc! { "created_at": -1, "_id": -1 })
                .skip(page.skip())
                .limit(page.page_size().cast_signed())
                .await?
                .try_collect()
                .await?;

            let items = records
                .into_iter()
                .map(Comment::try_from)
                .collect::<Result<_, _>>()?;

            Ok(Some(Page { items, total_items }))
        })
        .await
    }

    /// Stores a comment and bumps the idea's counter in one transaction.
    ///
    /// Returns `None` when the idea does not exist.
    pub async fn create_comment(
        &self,
        idea_id: Id<IdeaMarker>,
        user_id: &UserId,
        content: &CommentContent,
    ) -> Result<Option<Comment>> {
        let record = CommentRecord::new(
            idea_id.object_id(),
            user_id.get().to_owned(),
            content.get().to_owned(),
        );
        let context = (self.comments(), self.ideas(), record);

        let created = self
            .timed(async {
                let mut session = self.client.start_session().await?;

                let created = session
                    .start_transaction()
                    .and_run(context, |session, (comments, ideas, record)| {
                        async move {
                            let (filter, update) =
                                query::counter_update(record.idea_id, "comments_count", 1);
                            let updated = ideas
                                .update_one(filter, update)
                                .session(&mut *session)
                                .await?;
                            if updated.matched_count == 0 {
                                return Ok(None);
                            }

                            comments.insert_one(&*record).session(&mut *session).await?;

                            Ok(Some(record.clone()))
                        }
                        .boxed()
                    })
                    .await?;

                Ok(created)
            })
            .await?;

        created.map(Comment::try_from).transpose().map_err(DbError::from)
    }

    /// Deletes a comment written by `user_id` and decrements the idea's
    /// counter in one transaction.
    pub async fn delete_comment(
        &self,
        idea_id: Id<IdeaMarker>,
        comment_id: Id<CommentMarker>,
        user_id: &UserId,
    ) -> Result<CommentDeletion> {
        let filter = doc! {
            "_id": comment_id.object_id(),
            "idea_id": idea_id.object_id(),
        };
        let context = (self.comments(), self.ideas(), filter, user_id.clone());

        let outcome = self
            .timed(async {
                let mut session = self.client.start_session().await?;

                let outcome = session
                    .start_transaction()
                    .and_run(context, |session, (comments, ideas, filter, user_id)| {
                        async move {
                            let Some(comment) = comments
                                .find_one(filter.clone())
                                .session(&mut *session)
                                .await?
                            else {
                                return Ok(CommentDeletion::NotFound);
                            };
                            if comment.user_id != user_id.get() {
                                return Ok(CommentDeletion::NotAuthor);
                            }

                            comments
                                .delete_one(filter.clone())
                                .session(&mut *session)
                                .await?;

                            let (filter, update) =
                                query::counter_update(comment.idea_id, "comments_count", -1);
                            ideas
                                .update_one(filter, update)
                                .session(&mut *session)
                                .await?;

                            Ok(CommentDeletion::Deleted)
                        }
                        .boxed()
                    })
                    .await?;

                Ok(outcome)
            })
            .await?;

        debug!(%user_id, %idea_id, %comment_id, ?outcome, "Delete comment");
        Ok(outcome)
    }

    pub async fn fetch_projects(&self) -> Result<Vec<Project>> {
        self.timed(async {
            let records: Vec<ProjectRecord> =
                self.projects().find(doc! {}).await?.try_collect().await?;

            Ok(records.into_iter().map(Project::from).collect())
        })
        .await
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError {
            code: DUPLICATE_KEY,
            ..
        }))
    )
}
