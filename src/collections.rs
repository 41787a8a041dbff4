//! Collections and their items.
//!
//! These are the queries the app runs against the artifact, exposed here so
//! a built database can be inspected and seeded from the command line.
//! Collection names are unique; the default collection created by the
//! schema initializer cannot be deleted. Deleting a collection cascades to
//! its items.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::CollectionError;
use crate::models::{Collection, CollectionItem, PersistedPoem};

const COLLECTION_COLUMNS: &str =
    "c.id, c.name, c.description, CAST(c.created_at AS TEXT) AS created_at, c.is_default";

fn collection_from_row(row: &SqliteRow) -> Collection {
    Collection {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        is_default: row.get::<Option<i64>, _>("is_default").unwrap_or(0) != 0,
    }
}

fn poem_from_row(row: &SqliteRow) -> PersistedPoem {
    PersistedPoem {
        id: row.get("id"),
        title: row.get("title"),
        author: row.get("author"),
        dynasty: row.get("dynasty"),
        content: row.get("content"),
        hot: row.get::<Option<i64>, _>("hot").unwrap_or(0) != 0,
    }
}

/// Result of [`add_poem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub item_id: i64,
    /// `false` when the poem was already in the collection.
    pub created: bool,
}

/// All collections, the default one first, then in creation order.
pub async fn list_collections(pool: &SqlitePool) -> Result<Vec<Collection>, CollectionError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM collections c ORDER BY c.is_default DESC, c.created_at ASC, c.id ASC",
        COLLECTION_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(collection_from_row).collect())
}

pub async fn default_collection(pool: &SqlitePool) -> Result<Option<Collection>, CollectionError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM collections c WHERE c.is_default = 1 ORDER BY c.id LIMIT 1",
        COLLECTION_COLUMNS
    ))
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(collection_from_row))
}

pub async fn get_collection(pool: &SqlitePool, id: i64) -> Result<Collection, CollectionError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM collections c WHERE c.id = ?",
        COLLECTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref()
        .map(collection_from_row)
        .ok_or(CollectionError::CollectionNotFound(id))
}

/// Create a non-default collection and return its id.
pub async fn create_collection(
    pool: &SqlitePool,
    name: &str,
    description: Option<&str>,
) -> Result<i64, CollectionError> {
    let result =
        sqlx::query("INSERT INTO collections (name, description, is_default) VALUES (?, ?, 0)")
            .bind(name)
            .bind(description.unwrap_or(""))
            .execute(pool)
            .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(CollectionError::NameExists(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Add a poem to a collection. Adding a poem that is already present is a
/// no-op returning the existing item's id.
pub async fn add_poem(
    pool: &SqlitePool,
    collection_id: i64,
    poem_id: i64,
) -> Result<AddOutcome, CollectionError> {
    let mut tx = pool.begin().await?;

    let collection: Option<i64> = sqlx::query_scalar("SELECT id FROM collections WHERE id = ?")
        .bind(collection_id)
        .fetch_optional(&mut *tx)
        .await?;
    if collection.is_none() {
        return Err(CollectionError::CollectionNotFound(collection_id));
    }

    let poem: Option<i64> = sqlx::query_scalar("SELECT id FROM poems WHERE id = ?")
        .bind(poem_id)
        .fetch_optional(&mut *tx)
        .await?;
    if poem.is_none() {
        return Err(CollectionError::PoemNotFound(poem_id));
    }

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM collection_items WHERE collection_id = ? AND poem_id = ?",
    )
    .bind(collection_id)
    .bind(poem_id)
    .fetch_optional(&mut *tx)
    .await?;

    let outcome = match existing {
        Some(item_id) => AddOutcome {
            item_id,
            created: false,
        },
        None => {
            let item_id =
                sqlx::query("INSERT INTO collection_items (collection_id, poem_id) VALUES (?, ?)")
                    .bind(collection_id)
                    .bind(poem_id)
                    .execute(&mut *tx)
                    .await?
                    .last_insert_rowid();
            AddOutcome {
                item_id,
                created: true,
            }
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Remove a poem from a collection. Returns `false` if it was not there.
pub async fn remove_poem(
    pool: &SqlitePool,
    collection_id: i64,
    poem_id: i64,
) -> Result<bool, CollectionError> {
    let removed = sqlx::query("DELETE FROM collection_items WHERE collection_id = ? AND poem_id = ?")
        .bind(collection_id)
        .bind(poem_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(removed > 0)
}

pub async fn is_in_collection(
    pool: &SqlitePool,
    collection_id: i64,
    poem_id: i64,
) -> Result<bool, CollectionError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM collection_items WHERE collection_id = ? AND poem_id = ?",
    )
    .bind(collection_id)
    .bind(poem_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Whether the poem is in any collection at all.
pub async fn is_collected(pool: &SqlitePool, poem_id: i64) -> Result<bool, CollectionError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collection_items WHERE poem_id = ?")
        .bind(poem_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Collections holding the poem, the default one first, then by name.
pub async fn collections_for_poem(
    pool: &SqlitePool,
    poem_id: i64,
) -> Result<Vec<Collection>, CollectionError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM collections c \
         INNER JOIN collection_items ci ON c.id = ci.collection_id \
         WHERE ci.poem_id = ? \
         ORDER BY c.is_default DESC, c.name ASC",
        COLLECTION_COLUMNS
    ))
    .bind(poem_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(collection_from_row).collect())
}

/// A page of the collection's poems, most recently added first.
pub async fn collection_poems(
    pool: &SqlitePool,
    collection_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<PersistedPoem>, CollectionError> {
    let rows = sqlx::query(
        "SELECT p.id, p.title, p.author, p.dynasty, p.content, p.hot FROM poems p \
         INNER JOIN collection_items ci ON p.id = ci.poem_id \
         WHERE ci.collection_id = ? \
         ORDER BY ci.created_at DESC, ci.id DESC \
         LIMIT ? OFFSET ?",
    )
    .bind(collection_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(poem_from_row).collect())
}

pub async fn collection_items(
    pool: &SqlitePool,
    collection_id: i64,
) -> Result<Vec<CollectionItem>, CollectionError> {
    let rows = sqlx::query(
        "SELECT id, collection_id, poem_id, CAST(created_at AS TEXT) AS created_at \
         FROM collection_items WHERE collection_id = ? ORDER BY id",
    )
    .bind(collection_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|row| CollectionItem {
            id: row.get("id"),
            collection_id: row.get("collection_id"),
            poem_id: row.get("poem_id"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub async fn collection_poem_count(
    pool: &SqlitePool,
    collection_id: i64,
) -> Result<i64, CollectionError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM collection_items WHERE collection_id = ?")
            .bind(collection_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Delete a non-default collection together with its items.
pub async fn delete_collection(pool: &SqlitePool, collection_id: i64) -> Result<(), CollectionError> {
    let collection = get_collection(pool, collection_id).await?;
    if collection.is_default {
        return Err(CollectionError::DefaultProtected);
    }

    sqlx::query("DELETE FROM collections WHERE id = ? AND is_default = 0")
        .bind(collection_id)
        .execute(pool)
        .await?;
    Ok(())
}

// CLI entry points for `poemdb collection ...`.

pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    let collections = list_collections(&pool).await?;

    for c in &collections {
        let count = collection_poem_count(&pool, c.id).await?;
        println!(
            "{:>4}  {}{}  ({} poems)",
            c.id,
            c.name,
            if c.is_default { " [default]" } else { "" },
            count
        );
    }
    println!("{} collection(s)", collections.len());

    pool.close().await;
    Ok(())
}

pub async fn run_create(config: &Config, name: &str, description: Option<&str>) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    let id = create_collection(&pool, name, description).await?;
    println!("created collection {} ({})", id, name);
    pool.close().await;
    Ok(())
}

pub async fn run_add(config: &Config, collection_id: i64, poem_id: i64) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    let outcome = add_poem(&pool, collection_id, poem_id).await?;
    if outcome.created {
        println!("added poem {} to collection {}", poem_id, collection_id);
    } else {
        println!("poem {} already in collection {}", poem_id, collection_id);
    }
    pool.close().await;
    Ok(())
}

pub async fn run_remove(config: &Config, collection_id: i64, poem_id: i64) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    if remove_poem(&pool, collection_id, poem_id).await? {
        println!("removed poem {} from collection {}", poem_id, collection_id);
    } else {
        println!("poem {} was not in collection {}", poem_id, collection_id);
    }
    pool.close().await;
    Ok(())
}

pub async fn run_delete(config: &Config, collection_id: i64) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    delete_collection(&pool, collection_id).await?;
    println!("deleted collection {}", collection_id);
    pool.close().await;
    Ok(())
}

pub async fn run_show(config: &Config, collection_id: i64, limit: i64, offset: i64) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    let collection = get_collection(&pool, collection_id).await?;
    let total = collection_poem_count(&pool, collection_id).await?;
    let poems = collection_poems(&pool, collection_id, limit, offset).await?;

    println!("{} ({} poems)", collection.name, total);
    if let Some(description) = collection.description.as_deref().filter(|d| !d.is_empty()) {
        println!("{}", description);
    }
    for poem in &poems {
        println!(
            "{:>8}  {}  {}{}",
            poem.id,
            poem.title,
            poem.author.as_deref().unwrap_or("佚名"),
            if poem.hot { "  *" } else { "" }
        );
    }

    pool.close().await;
    Ok(())
}
