//! Contact repository — address book, groups, and group membership.

use bulkline_common::models::contact::{Contact, ContactGroup, ContactGroupSummary};
use sqlx::PgPool;
use uuid::Uuid;

/// Row shape for bulk inserts.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_contact(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    name: &str,
    phone: &str,
    email: Option<&str>,
    notes: Option<&str>,
) -> Result<Contact, sqlx::Error> {
    sqlx::query_as::<_, Contact>(
        r#"
        INSERT INTO contacts (id, user_id, name, phone, email, notes, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(phone)
    .bind(email)
    .bind(notes)
    .fetch_one(pool)
    .await
}

/// Insert many contacts in one statement. Phones already present for the
/// owner are skipped. Returns the number of rows written.
pub async fn insert_many(
    pool: &PgPool,
    user_id: Uuid,
    contacts: &[NewContact],
) -> Result<u64, sqlx::Error> {
    if contacts.is_empty() {
        return Ok(0);
    }

    let ids: Vec<Uuid> = contacts.iter().map(|c| c.id).collect();
    let names: Vec<String> = contacts.iter().map(|c| c.name.clone()).collect();
    let phones: Vec<String> = contacts.iter().map(|c| c.phone.clone()).collect();
    let emails: Vec<Option<String>> = contacts.iter().map(|c| c.email.clone()).collect();
    let notes: Vec<Option<String>> = contacts.iter().map(|c| c.notes.clone()).collect();

    let result = sqlx::query(
        r#"
        INSERT INTO contacts (id, user_id, name, phone, email, notes, created_at, updated_at)
        SELECT t.id, $2, t.name, t.phone, t.email, t.notes, NOW(), NOW()
        FROM UNNEST($1::uuid[], $3::text[], $4::text[], $5::text[], $6::text[])
            AS t(id, name, phone, email, notes)
        ON CONFLICT (user_id, phone) DO NOTHING
        "#,
    )
    .bind(&ids)
    .bind(user_id)
    .bind(&names)
    .bind(&phones)
    .bind(&emails)
    .bind(&notes)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn find_by_id(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_phone(
    pool: &PgPool,
    user_id: Uuid,
    phone: &str,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE user_id = $1 AND phone = $2")
        .bind(user_id)
        .bind(phone)
        .fetch_optional(pool)
        .await
}

/// List a user's contacts, optionally filtered by a search term and/or group.
pub async fn list_contacts(
    pool: &PgPool,
    user_id: Uuid,
    search: Option<&str>,
    group_id: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Contact>, sqlx::Error> {
    let pattern = search.map(|s| format!("%{}%", s.trim()));
    sqlx::query_as::<_, Contact>(
        r#"
        SELECT c.* FROM contacts c
        WHERE c.user_id = $1
          AND ($2::text IS NULL OR c.name ILIKE $2 OR c.phone ILIKE $2)
          AND ($3::uuid IS NULL OR EXISTS (
                SELECT 1 FROM contact_group_members m
                WHERE m.contact_id = c.id AND m.group_id = $3))
        ORDER BY c.name
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(user_id)
    .bind(pattern)
    .bind(group_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn update_contact(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
    name: Option<&str>,
    phone: Option<&str>,
    email: Option<&str>,
    notes: Option<&str>,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(
        r#"
        UPDATE contacts SET
            name = COALESCE($3, name),
            phone = COALESCE($4, phone),
            email = COALESCE($5, email),
            notes = COALESCE($6, notes),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(phone)
    .bind(email)
    .bind(notes)
    .fetch_optional(pool)
    .await
}

/// Hard delete. Returns whether a row was removed.
pub async fn delete_contact(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_contacts(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

// ── Groups ────────────────────────────────────────────────────────────────────

pub async fn create_group(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    name: &str,
    description: Option<&str>,
) -> Result<ContactGroup, sqlx::Error> {
    sqlx::query_as::<_, ContactGroup>(
        r#"
        INSERT INTO contact_groups (id, user_id, name, description, created_at, updated_at)
        VALUES ($1, $2, $3, $4, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await
}

pub async fn find_group(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<ContactGroup>, sqlx::Error> {
    sqlx::query_as::<_, ContactGroup>("SELECT * FROM contact_groups WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_groups(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ContactGroupSummary>, sqlx::Error> {
    sqlx::query_as::<_, ContactGroupSummary>(
        r#"
        SELECT g.id, g.name, g.description, g.created_at,
               COUNT(m.contact_id) AS member_count
        FROM contact_groups g
        LEFT JOIN contact_group_members m ON m.group_id = g.id
        WHERE g.user_id = $1
        GROUP BY g.id
        ORDER BY g.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn delete_group(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contact_groups WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_groups(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contact_groups WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

/// Add contacts to a group. Only contacts owned by `user_id` are added;
/// existing memberships are left alone. Returns the number of new memberships.
pub async fn add_members(
    pool: &PgPool,
    user_id: Uuid,
    group_id: Uuid,
    contact_ids: &[Uuid],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO contact_group_members (group_id, contact_id, added_at)
        SELECT $1, c.id, NOW()
        FROM contacts c
        WHERE c.user_id = $2 AND c.id = ANY($3)
        ON CONFLICT (group_id, contact_id) DO NOTHING
        "#,
    )
    .bind(group_id)
    .bind(user_id)
    .bind(contact_ids)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn remove_members(
    pool: &PgPool,
    group_id: Uuid,
    contact_ids: &[Uuid],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM contact_group_members WHERE group_id = $1 AND contact_id = ANY($2)",
    )
    .bind(group_id)
    .bind(contact_ids)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Phone numbers of every contact in a group.
pub async fn group_phones(
    pool: &PgPool,
    user_id: Uuid,
    group_id: Uuid,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT c.phone FROM contacts c
        JOIN contact_group_members m ON m.contact_id = c.id
        WHERE m.group_id = $1 AND c.user_id = $2
        ORDER BY c.phone
        "#,
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(phone,)| phone).collect())
}
