use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncPgConnection, RunQueryDsl,
};

use crate::models::{
    ActionItemRow, CalendarEventRow, KeywordRow, MeetingResultChangeset, MeetingResultRow,
    MeetingRow, NewActionItem, NewCalendarEvent, NewMeeting, NewParticipant, NewRecording,
    NewResultKeyword, NewTodo, NewTranscript, OAuthTokenRow, ParticipantRow, RecordingRow,
    TodoRow, TranscriptRow, UserRow,
};

pub type DbPool = Pool<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

/// Build the pool. Connections are opened lazily on first checkout.
pub fn establish_connection_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).build()?;

    Ok(pool)
}

pub mod users {
    use super::*;

    pub async fn get_by_email(
        conn: &mut AsyncPgConnection,
        user_email: &str,
    ) -> anyhow::Result<Option<UserRow>> {
        use crate::schema::users::dsl::*;

        let user = users
            .filter(email.eq(user_email))
            .select(UserRow::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(user)
    }

    /// First user whose display name matches exactly.
    pub async fn find_by_name(
        conn: &mut AsyncPgConnection,
        display_name: &str,
    ) -> anyhow::Result<Option<UserRow>> {
        use crate::schema::users::dsl::*;

        let user = users
            .filter(name.eq(display_name))
            .order_by(id.asc())
            .select(UserRow::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(user)
    }
}

pub mod oauth_tokens {
    use super::*;

    pub async fn get_token(
        conn: &mut AsyncPgConnection,
        email: &str,
        provider_name: &str,
    ) -> anyhow::Result<Option<OAuthTokenRow>> {
        use crate::schema::oauth_tokens::dsl::*;

        let token = oauth_tokens
            .filter(user_email.eq(email))
            .filter(provider.eq(provider_name))
            .select(OAuthTokenRow::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(token)
    }
}

pub mod meetings {
    use super::*;
    use chrono::NaiveDateTime;

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        meeting_id: i64,
    ) -> anyhow::Result<Option<MeetingRow>> {
        use crate::schema::meetings::dsl::*;

        let meeting = meetings
            .find(meeting_id)
            .select(MeetingRow::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(meeting)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_meeting: &NewMeeting,
    ) -> anyhow::Result<MeetingRow> {
        use crate::schema::meetings::dsl::*;

        let meeting = diesel::insert_into(meetings)
            .values(new_meeting)
            .returning(MeetingRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(meeting)
    }

    pub async fn update_title(
        conn: &mut AsyncPgConnection,
        meeting_id: i64,
        new_title: &str,
    ) -> anyhow::Result<()> {
        use crate::schema::meetings::dsl::*;

        diesel::update(meetings.find(meeting_id))
            .set((title.eq(new_title), updated_at.eq(Utc::now())))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn mark_recording(
        conn: &mut AsyncPgConnection,
        meeting_id: i64,
        at: NaiveDateTime,
    ) -> anyhow::Result<MeetingRow> {
        use crate::schema::meetings::dsl::*;

        let meeting = diesel::update(meetings.find(meeting_id))
            .set((
                status.eq("RECORDING"),
                started_at.eq(Some(at)),
                updated_at.eq(Utc::now()),
            ))
            .returning(MeetingRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(meeting)
    }

    pub async fn mark_completed(
        conn: &mut AsyncPgConnection,
        meeting_id: i64,
        at: NaiveDateTime,
    ) -> anyhow::Result<MeetingRow> {
        use crate::schema::meetings::dsl::*;

        let meeting = diesel::update(meetings.find(meeting_id))
            .set((
                status.eq("COMPLETED"),
                ended_at.eq(Some(at)),
                updated_at.eq(Utc::now()),
            ))
            .returning(MeetingRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(meeting)
    }

    /// Flip importance on a meeting hosted by `host_id`.
    pub async fn toggle_importance(
        conn: &mut AsyncPgConnection,
        meeting_id: i64,
        host_id: i64,
    ) -> anyhow::Result<Option<MeetingRow>> {
        use crate::schema::meetings::dsl::*;

        let meeting = diesel::update(
            meetings
                .filter(id.eq(meeting_id))
                .filter(host_user_id.eq(host_id)),
        )
        .set((is_important.eq(diesel::dsl::not(is_important)), updated_at.eq(Utc::now())))
        .returning(MeetingRow::as_returning())
        .get_result(conn)
        .await
        .optional()?;

        Ok(meeting)
    }
}

pub mod participants {
    use super::*;

    pub async fn list_for_meeting(
        conn: &mut AsyncPgConnection,
        meeting: i64,
    ) -> anyhow::Result<Vec<ParticipantRow>> {
        use crate::schema::participants::dsl::*;

        let rows = participants
            .filter(meeting_id.eq(meeting))
            .order_by(id.asc())
            .select(ParticipantRow::as_select())
            .load(conn)
            .await?;

        Ok(rows)
    }

    /// Replace the whole participant set of a meeting.
    pub async fn replace(
        conn: &mut AsyncPgConnection,
        meeting: i64,
        rows: &[NewParticipant],
    ) -> anyhow::Result<()> {
        use crate::schema::participants::dsl::*;

        diesel::delete(participants.filter(meeting_id.eq(meeting)))
            .execute(conn)
            .await?;

        if !rows.is_empty() {
            diesel::insert_into(participants)
                .values(rows)
                .execute(conn)
                .await?;
        }

        Ok(())
    }
}

pub mod meeting_results {
    use super::*;

    pub async fn get_for_meeting(
        conn: &mut AsyncPgConnection,
        meeting: i64,
    ) -> anyhow::Result<Option<MeetingResultRow>> {
        use crate::schema::meeting_results::dsl::*;

        let result = meeting_results
            .filter(meeting_id.eq(meeting))
            .select(MeetingResultRow::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(result)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        meeting: i64,
    ) -> anyhow::Result<MeetingResultRow> {
        use crate::schema::meeting_results::dsl::*;

        let result = diesel::insert_into(meeting_results)
            .values(meeting_id.eq(meeting))
            .returning(MeetingResultRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(result)
    }

    pub async fn get_or_create(
        conn: &mut AsyncPgConnection,
        meeting: i64,
    ) -> anyhow::Result<MeetingResultRow> {
        match get_for_meeting(conn, meeting).await? {
            Some(result) => Ok(result),
            None => create(conn, meeting).await,
        }
    }

    pub async fn update_summary(
        conn: &mut AsyncPgConnection,
        result_id: i64,
        changes: &MeetingResultChangeset,
    ) -> anyhow::Result<()> {
        use crate::schema::meeting_results::dsl::*;

        diesel::update(meeting_results.find(result_id))
            .set((changes, updated_at.eq(Utc::now())))
            .execute(conn)
            .await?;

        Ok(())
    }
}

pub mod keywords {
    use super::*;
    use crate::schema::{keywords, meeting_result_keywords};
    use crate::services::keywords::KeywordLink;

    /// Keyword rows are global and keyed by normalized name.
    pub async fn find_or_create(
        conn: &mut AsyncPgConnection,
        keyword_name: &str,
    ) -> anyhow::Result<KeywordRow> {
        diesel::insert_into(keywords::table)
            .values(keywords::name.eq(keyword_name))
            .on_conflict(keywords::name)
            .do_nothing()
            .execute(conn)
            .await?;

        let keyword = keywords::table
            .filter(keywords::name.eq(keyword_name))
            .select(KeywordRow::as_select())
            .first(conn)
            .await?;

        Ok(keyword)
    }

    /// `(name, source)` of every keyword linked to a result, in link order.
    pub async fn linked_to_result(
        conn: &mut AsyncPgConnection,
        result_id: i64,
    ) -> anyhow::Result<Vec<(String, String)>> {
        let links = meeting_result_keywords::table
            .inner_join(keywords::table)
            .filter(meeting_result_keywords::meeting_result_id.eq(result_id))
            .order_by(meeting_result_keywords::id.asc())
            .select((keywords::name, meeting_result_keywords::source))
            .load::<(String, String)>(conn)
            .await?;

        Ok(links)
    }

    pub async fn add_links(
        conn: &mut AsyncPgConnection,
        result_id: i64,
        links: &[KeywordLink],
    ) -> anyhow::Result<()> {
        let mut rows = Vec::with_capacity(links.len());
        for link in links {
            let keyword = find_or_create(conn, &link.name).await?;
            rows.push(NewResultKeyword {
                meeting_result_id: result_id,
                keyword_id: keyword.id,
                source: link.source.as_str().to_string(),
            });
        }

        if !rows.is_empty() {
            diesel::insert_into(meeting_result_keywords::table)
                .values(&rows)
                .on_conflict((
                    meeting_result_keywords::meeting_result_id,
                    meeting_result_keywords::keyword_id,
                ))
                .do_nothing()
                .execute(conn)
                .await?;
        }

        Ok(())
    }

    /// Drop every link of the result and link `links` instead.
    pub async fn replace_links(
        conn: &mut AsyncPgConnection,
        result_id: i64,
        links: &[KeywordLink],
    ) -> anyhow::Result<()> {
        diesel::delete(
            meeting_result_keywords::table
                .filter(meeting_result_keywords::meeting_result_id.eq(result_id)),
        )
        .execute(conn)
        .await?;

        add_links(conn, result_id, links).await
    }

    /// Delete keywords no result links to anymore.
    pub async fn delete_orphans(conn: &mut AsyncPgConnection) -> anyhow::Result<usize> {
        let linked = meeting_result_keywords::table.select(meeting_result_keywords::keyword_id);

        let deleted = diesel::delete(keywords::table.filter(keywords::id.ne_all(linked)))
            .execute(conn)
            .await?;

        Ok(deleted)
    }
}

pub mod action_items {
    use super::*;
    use crate::schema::{action_items, users};

    /// Items of a result with the assignee's display name.
    pub async fn list_for_result(
        conn: &mut AsyncPgConnection,
        result_id: i64,
    ) -> anyhow::Result<Vec<(ActionItemRow, Option<String>)>> {
        let items = action_items::table
            .left_join(users::table)
            .filter(action_items::meeting_result_id.eq(result_id))
            .order_by(action_items::id.asc())
            .select((ActionItemRow::as_select(), users::name.nullable()))
            .load::<(ActionItemRow, Option<String>)>(conn)
            .await?;

        Ok(items)
    }

    pub async fn replace(
        conn: &mut AsyncPgConnection,
        result_id: i64,
        items: &[NewActionItem],
    ) -> anyhow::Result<()> {
        diesel::delete(action_items::table.filter(action_items::meeting_result_id.eq(result_id)))
            .execute(conn)
            .await?;

        if !items.is_empty() {
            diesel::insert_into(action_items::table)
                .values(items)
                .execute(conn)
                .await?;
        }

        Ok(())
    }
}

pub mod transcripts {
    use super::*;
    use crate::services::transcripts::TranscriptPlan;

    pub async fn list_for_meeting(
        conn: &mut AsyncPgConnection,
        meeting: i64,
    ) -> anyhow::Result<Vec<TranscriptRow>> {
        use crate::schema::transcripts::dsl::*;

        let rows = transcripts
            .filter(meeting_id.eq(meeting))
            .order_by((sequence_order.asc(), id.asc()))
            .select(TranscriptRow::as_select())
            .load(conn)
            .await?;

        Ok(rows)
    }

    pub async fn apply_plan(
        conn: &mut AsyncPgConnection,
        plan: &TranscriptPlan,
    ) -> anyhow::Result<()> {
        use crate::schema::transcripts::dsl::*;

        if !plan.deletes.is_empty() {
            diesel::delete(transcripts.filter(id.eq_any(&plan.deletes)))
                .execute(conn)
                .await?;
        }

        for update in &plan.updates {
            diesel::update(transcripts.find(update.id))
                .set((&update.changes, updated_at.eq(Utc::now())))
                .execute(conn)
                .await?;
        }

        if !plan.inserts.is_empty() {
            diesel::insert_into(transcripts)
                .values(&plan.inserts)
                .execute(conn)
                .await?;
        }

        Ok(())
    }

    /// Swap in a freshly captured transcript.
    pub async fn replace_all(
        conn: &mut AsyncPgConnection,
        meeting: i64,
        rows: &[NewTranscript],
    ) -> anyhow::Result<()> {
        use crate::schema::transcripts::dsl::*;

        diesel::delete(transcripts.filter(meeting_id.eq(meeting)))
            .execute(conn)
            .await?;

        if !rows.is_empty() {
            diesel::insert_into(transcripts)
                .values(rows)
                .execute(conn)
                .await?;
        }

        Ok(())
    }
}

pub mod recordings {
    use super::*;

    pub async fn get_for_meeting(
        conn: &mut AsyncPgConnection,
        meeting: i64,
    ) -> anyhow::Result<Option<RecordingRow>> {
        use crate::schema::recordings::dsl::*;

        let recording = recordings
            .filter(meeting_id.eq(meeting))
            .select(RecordingRow::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(recording)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_recording: &NewRecording,
    ) -> anyhow::Result<RecordingRow> {
        use crate::schema::recordings::dsl::*;

        let recording = diesel::insert_into(recordings)
            .values(new_recording)
            .returning(RecordingRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(recording)
    }
}

pub mod todos {
    use super::*;

    pub async fn create(conn: &mut AsyncPgConnection, new_todo: &NewTodo) -> anyhow::Result<TodoRow> {
        use crate::schema::todos::dsl::*;

        let todo = diesel::insert_into(todos)
            .values(new_todo)
            .returning(TodoRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(todo)
    }
}

pub mod calendar_events {
    use super::*;

    /// Events of a user dated within `[start, end]`.
    pub async fn list_in_range(
        conn: &mut AsyncPgConnection,
        owner: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<CalendarEventRow>> {
        use crate::schema::calendar_events::dsl::*;

        let rows = calendar_events
            .filter(user_id.eq(owner))
            .filter(event_date.between(start, end))
            .order_by((event_date.asc(), event_time.asc(), id.asc()))
            .select(CalendarEventRow::as_select())
            .load(conn)
            .await?;

        Ok(rows)
    }

    pub async fn find_by_external_id(
        conn: &mut AsyncPgConnection,
        owner: i64,
        external_id: &str,
    ) -> anyhow::Result<Option<CalendarEventRow>> {
        use crate::schema::calendar_events::dsl::*;

        let row = calendar_events
            .filter(user_id.eq(owner))
            .filter(external_event_id.eq(external_id))
            .select(CalendarEventRow::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(row)
    }

    pub async fn find_for_user(
        conn: &mut AsyncPgConnection,
        owner: i64,
        event_id: i64,
    ) -> anyhow::Result<Option<CalendarEventRow>> {
        use crate::schema::calendar_events::dsl::*;

        let row = calendar_events
            .filter(id.eq(event_id))
            .filter(user_id.eq(owner))
            .select(CalendarEventRow::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(row)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_event: &NewCalendarEvent,
    ) -> anyhow::Result<CalendarEventRow> {
        use crate::schema::calendar_events::dsl::*;

        let row = diesel::insert_into(calendar_events)
            .values(new_event)
            .returning(CalendarEventRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(row)
    }

    /// Only title and date are taken from a provider-side edit.
    pub async fn update_title_and_date(
        conn: &mut AsyncPgConnection,
        event_id: i64,
        new_title: &str,
        new_date: NaiveDate,
    ) -> anyhow::Result<CalendarEventRow> {
        use crate::schema::calendar_events::dsl::*;

        let row = diesel::update(calendar_events.find(event_id))
            .set((title.eq(new_title), event_date.eq(new_date)))
            .returning(CalendarEventRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(row)
    }

    pub async fn set_importance(
        conn: &mut AsyncPgConnection,
        event_id: i64,
        important: bool,
    ) -> anyhow::Result<CalendarEventRow> {
        use crate::schema::calendar_events::dsl::*;

        let row = diesel::update(calendar_events.find(event_id))
            .set(is_important.eq(important))
            .returning(CalendarEventRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(row)
    }

    pub async fn set_completion(
        conn: &mut AsyncPgConnection,
        event_id: i64,
        completed: bool,
    ) -> anyhow::Result<CalendarEventRow> {
        use crate::schema::calendar_events::dsl::*;

        let row = diesel::update(calendar_events.find(event_id))
            .set(is_completed.eq(completed))
            .returning(CalendarEventRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(row)
    }

    pub async fn delete(conn: &mut AsyncPgConnection, event_id: i64) -> anyhow::Result<()> {
        use crate::schema::calendar_events::dsl::*;

        diesel::delete(calendar_events.find(event_id))
            .execute(conn)
            .await?;

        Ok(())
    }
}
