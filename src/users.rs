//! The Users API family: user records plus their nested loans, requests,
//! fees, and deposits.

use serde_json::Value;

use crate::connection::Connection;
use crate::payload::Payload;
use crate::query::{BriefQuery, PageOptions};
use crate::response::{Content, RawResponse};
use crate::Error;

const USERS_PATH: &str = "/almaws/v1/users";

/// Record keys of the list responses in this family.
const USERS_KEY: &str = "user";
const LOANS_KEY: &str = "item_loan";
const REQUESTS_KEY: &str = "user_request";
const DEPOSITS_KEY: &str = "user_deposit";

/// Outcome of [`UsersClient::create`].
#[derive(Debug)]
pub enum CreateOutcome {
    /// No record with the identifier existed; the server's representation of
    /// the new record is attached.
    Created(Content),
    /// A record with the identifier already exists. Nothing was sent.
    AlreadyExists,
}

impl CreateOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Outcome of [`UsersClient::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record existed and the update was accepted.
    Updated,
    /// No record with that primary id.
    NotFound,
}

impl UpdateOutcome {
    /// The zero-or-one record count this API family reports for mutations.
    pub fn total_record_count(&self) -> i64 {
        match self {
            UpdateOutcome::Updated => 1,
            UpdateOutcome::NotFound => 0,
        }
    }
}

/// Outcome of [`UsersClient::delete`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Exactly one record matched and was deleted.
    Deleted,
    /// The identifier matched no record, or more than one.
    NotFound,
}

impl DeleteOutcome {
    /// The zero-or-one record count this API family reports for mutations.
    pub fn total_record_count(&self) -> i64 {
        match self {
            DeleteOutcome::Deleted => 1,
            DeleteOutcome::NotFound => 0,
        }
    }
}

/// Sub-client for `/almaws/v1/users`.
#[derive(Clone, Debug)]
pub struct UsersClient {
    conn: Connection,
    /// Loans of a user (`/users/{id}/loans`).
    pub loans: UserLoansClient,
    /// Resource sharing and hold requests of a user (`/users/{id}/requests`).
    pub requests: UserRequestsClient,
    /// Fines and fees of a user (`/users/{id}/fees`).
    pub fees: UserFeesClient,
    /// Deposits of a user (`/users/{id}/deposits`).
    pub deposits: UserDepositsClient,
}

impl UsersClient {
    pub(crate) fn new(conn: &Connection) -> Self {
        UsersClient {
            loans: UserLoansClient { conn: conn.clone() },
            requests: UserRequestsClient { conn: conn.clone() },
            fees: UserFeesClient { conn: conn.clone() },
            deposits: UserDepositsClient { conn: conn.clone() },
            conn: conn.clone(),
        }
    }

    /// Retrieves one user by id, or a filtered user list.
    ///
    /// With `user_id` set, the query and paging window are ignored and the
    /// single record is fetched directly; extra parameters still apply.
    /// Otherwise `query` filters the list and `opts` controls the window.
    /// With [`PageOptions::all_records`] the list keeps growing until the
    /// server-reported total is reached.
    pub async fn read(
        &self,
        user_id: Option<&str>,
        query: &BriefQuery,
        opts: &PageOptions,
    ) -> Result<Content, Error> {
        match user_id {
            Some(id) => self.conn.get(&one_path(USERS_PATH, id), &opts.extra).await,
            None => {
                let params = list_params(query, opts);
                let first = self.conn.get(USERS_PATH, &params).await?;
                if opts.all_records {
                    self.conn
                        .get_all(USERS_PATH, &params, opts.clamped_limit(), first, USERS_KEY)
                        .await
                } else {
                    Ok(first)
                }
            }
        }
    }

    /// Like [`read`](Self::read), but returns the undecoded responses, one
    /// per request made.
    pub async fn read_raw(
        &self,
        user_id: Option<&str>,
        query: &BriefQuery,
        opts: &PageOptions,
    ) -> Result<Vec<RawResponse>, Error> {
        match user_id {
            Some(id) => Ok(vec![
                self.conn.get_raw(&one_path(USERS_PATH, id), &opts.extra).await?,
            ]),
            None => {
                let params = list_params(query, opts);
                let first = self.conn.get_raw(USERS_PATH, &params).await?;
                if opts.all_records {
                    self.conn
                        .get_all_raw(USERS_PATH, &params, opts.clamped_limit(), first)
                        .await
                } else {
                    Ok(vec![first])
                }
            }
        }
    }

    /// Creates a user unless a record with the identifier already exists.
    ///
    /// Existence is probed first with a brief search on the identifier:
    /// `primary_id` when `id_type` is `"primary_id"`, the general
    /// `identifiers` field (plus an `id_type` parameter) otherwise. An
    /// existing match short-circuits to [`CreateOutcome::AlreadyExists`]
    /// without sending anything. For a primary-id create with a JSON mapping
    /// payload, the `primary_id` field is filled in from `identifier`.
    pub async fn create(
        &self,
        identifier: &str,
        id_type: &str,
        user_data: Payload,
    ) -> Result<CreateOutcome, Error> {
        let mut user_data = user_data;
        let mut params: Vec<(String, String)> = Vec::new();
        let query = if id_type == "primary_id" {
            if let Payload::Json(Value::Object(fields)) = &mut user_data {
                fields.insert(
                    "primary_id".to_string(),
                    Value::String(identifier.to_string()),
                );
            }
            BriefQuery::new().with_field("primary_id", identifier)
        } else {
            params.push(("id_type".to_string(), id_type.to_string()));
            BriefQuery::new().with_field("identifiers", identifier)
        };

        let mut search_params = params.clone();
        search_params.push(("q".to_string(), query.to_string()));
        let found = self.conn.get(USERS_PATH, &search_params).await?;
        if search_total(&found)? != 0 {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let created = self.conn.post(USERS_PATH, &user_data, &params).await?;
        Ok(CreateOutcome::Created(created))
    }

    /// Updates a user record in place.
    ///
    /// The record is fetched first; an id the service rejects as unknown
    /// maps to [`UpdateOutcome::NotFound`] instead of an error, as does a
    /// fetched record without a primary id. Authorization and server
    /// failures during the probe still surface as errors. The update goes to
    /// the primary id of the fetched record, so any identifier the service
    /// resolves on reads works here too.
    pub async fn update(&self, user_id: &str, user_data: Payload) -> Result<UpdateOutcome, Error> {
        let current = match self.conn.get(&one_path(USERS_PATH, user_id), &[]).await {
            Ok(content) => content,
            // Unknown ids come back as 400 with an error list, not 404.
            Err(Error::Api {
                status: 400 | 404, ..
            }) => return Ok(UpdateOutcome::NotFound),
            Err(err) => return Err(err),
        };
        let Some(primary_id) = record_primary_id(&current) else {
            return Ok(UpdateOutcome::NotFound);
        };
        self.conn
            .put(&one_path(USERS_PATH, &primary_id), &user_data)
            .await?;
        Ok(UpdateOutcome::Updated)
    }

    /// Deletes a user when the identifier matches exactly one record.
    ///
    /// The primary id sent to the delete endpoint is taken from the matched
    /// record itself, so non-primary identifier types (barcodes and the
    /// like) resolve to the right record.
    pub async fn delete(&self, identifier: &str, id_type: &str) -> Result<DeleteOutcome, Error> {
        let mut params: Vec<(String, String)> = Vec::new();
        let query = if id_type == "primary_id" {
            BriefQuery::new().with_field("primary_id", identifier)
        } else {
            params.push(("id_type".to_string(), id_type.to_string()));
            BriefQuery::new().with_field("identifiers", identifier)
        };
        params.push(("q".to_string(), query.to_string()));

        let found = self.conn.get(USERS_PATH, &params).await?;
        if search_total(&found)? != 1 {
            return Ok(DeleteOutcome::NotFound);
        }
        let primary_id = first_matched_primary_id(&found).ok_or_else(|| {
            Error::UnexpectedResponse(
                "matched user record did not carry a primary id".to_string(),
            )
        })?;

        let delete_params = vec![("primary_id".to_string(), primary_id.clone())];
        self.conn
            .delete(&one_path(USERS_PATH, &primary_id), &delete_params)
            .await?;
        Ok(DeleteOutcome::Deleted)
    }
}

/// Sub-client for a user's loans.
#[derive(Clone, Debug)]
pub struct UserLoansClient {
    conn: Connection,
}

impl UserLoansClient {
    /// Retrieves one loan by id, or the paged loan list for a user.
    pub async fn read(
        &self,
        user_id: &str,
        loan_id: Option<&str>,
        opts: &PageOptions,
    ) -> Result<Content, Error> {
        let base = nested_path(user_id, "loans");
        read_nested(&self.conn, &base, loan_id, opts, LOANS_KEY).await
    }

    /// Like [`read`](Self::read), but returns the undecoded responses.
    pub async fn read_raw(
        &self,
        user_id: &str,
        loan_id: Option<&str>,
        opts: &PageOptions,
    ) -> Result<Vec<RawResponse>, Error> {
        let base = nested_path(user_id, "loans");
        read_nested_raw(&self.conn, &base, loan_id, opts).await
    }
}

/// Sub-client for a user's requests.
#[derive(Clone, Debug)]
pub struct UserRequestsClient {
    conn: Connection,
}

impl UserRequestsClient {
    /// Retrieves one request by id, or the paged request list for a user.
    pub async fn read(
        &self,
        user_id: &str,
        request_id: Option<&str>,
        opts: &PageOptions,
    ) -> Result<Content, Error> {
        let base = nested_path(user_id, "requests");
        read_nested(&self.conn, &base, request_id, opts, REQUESTS_KEY).await
    }

    /// Like [`read`](Self::read), but returns the undecoded responses.
    pub async fn read_raw(
        &self,
        user_id: &str,
        request_id: Option<&str>,
        opts: &PageOptions,
    ) -> Result<Vec<RawResponse>, Error> {
        let base = nested_path(user_id, "requests");
        read_nested_raw(&self.conn, &base, request_id, opts).await
    }
}

/// Sub-client for a user's fines and fees.
///
/// The fees endpoints take no paging parameters; the whole list always
/// comes back in one reply.
#[derive(Clone, Debug)]
pub struct UserFeesClient {
    conn: Connection,
}

impl UserFeesClient {
    /// Retrieves one fee by id, or every fee for a user. `extra` parameters
    /// (such as `status`) pass through verbatim.
    pub async fn read(
        &self,
        user_id: &str,
        fee_id: Option<&str>,
        extra: &[(&str, &str)],
    ) -> Result<Content, Error> {
        self.conn
            .get(&fee_path(user_id, fee_id), &owned_params(extra))
            .await
    }

    /// Like [`read`](Self::read), but returns the undecoded response.
    pub async fn read_raw(
        &self,
        user_id: &str,
        fee_id: Option<&str>,
        extra: &[(&str, &str)],
    ) -> Result<RawResponse, Error> {
        self.conn
            .get_raw(&fee_path(user_id, fee_id), &owned_params(extra))
            .await
    }
}

/// Sub-client for a user's deposits.
#[derive(Clone, Debug)]
pub struct UserDepositsClient {
    conn: Connection,
}

impl UserDepositsClient {
    /// Retrieves one deposit by id, or the paged deposit list for a user.
    pub async fn read(
        &self,
        user_id: &str,
        deposit_id: Option<&str>,
        opts: &PageOptions,
    ) -> Result<Content, Error> {
        let base = nested_path(user_id, "deposits");
        read_nested(&self.conn, &base, deposit_id, opts, DEPOSITS_KEY).await
    }

    /// Like [`read`](Self::read), but returns the undecoded responses.
    pub async fn read_raw(
        &self,
        user_id: &str,
        deposit_id: Option<&str>,
        opts: &PageOptions,
    ) -> Result<Vec<RawResponse>, Error> {
        let base = nested_path(user_id, "deposits");
        read_nested_raw(&self.conn, &base, deposit_id, opts).await
    }
}

async fn read_nested(
    conn: &Connection,
    base: &str,
    record_id: Option<&str>,
    opts: &PageOptions,
    record_key: &str,
) -> Result<Content, Error> {
    match record_id {
        Some(id) => conn.get(&one_path(base, id), &opts.extra).await,
        None => {
            let params = opts.to_params();
            let first = conn.get(base, &params).await?;
            if opts.all_records {
                conn.get_all(base, &params, opts.clamped_limit(), first, record_key)
                    .await
            } else {
                Ok(first)
            }
        }
    }
}

async fn read_nested_raw(
    conn: &Connection,
    base: &str,
    record_id: Option<&str>,
    opts: &PageOptions,
) -> Result<Vec<RawResponse>, Error> {
    match record_id {
        Some(id) => Ok(vec![conn.get_raw(&one_path(base, id), &opts.extra).await?]),
        None => {
            let params = opts.to_params();
            let first = conn.get_raw(base, &params).await?;
            if opts.all_records {
                conn.get_all_raw(base, &params, opts.clamped_limit(), first).await
            } else {
                Ok(vec![first])
            }
        }
    }
}

fn one_path(base: &str, id: &str) -> String {
    format!("{}/{}", base, id)
}

fn nested_path(user_id: &str, resource: &str) -> String {
    format!("{}/{}/{}", USERS_PATH, user_id, resource)
}

fn fee_path(user_id: &str, fee_id: Option<&str>) -> String {
    let base = nested_path(user_id, "fees");
    match fee_id {
        Some(id) => one_path(&base, id),
        None => base,
    }
}

fn list_params(query: &BriefQuery, opts: &PageOptions) -> Vec<(String, String)> {
    let mut params = opts.to_params();
    if !query.is_empty() {
        params.push(("q".to_string(), query.to_string()));
    }
    params
}

fn owned_params(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn search_total(found: &Content) -> Result<i64, Error> {
    found.total_record_count().ok_or_else(|| {
        Error::UnexpectedResponse("user search did not report a total record count".to_string())
    })
}

/// `primary_id` of a single fetched user record.
fn record_primary_id(content: &Content) -> Option<String> {
    match content {
        Content::Json(value) => value
            .get("primary_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        Content::Xml(root) => root
            .child("primary_id")
            .map(|id| id.text.clone())
            .filter(|id| !id.is_empty()),
        Content::Other(_) => None,
    }
}

/// `primary_id` of the first record in a user search result.
fn first_matched_primary_id(content: &Content) -> Option<String> {
    match content {
        Content::Json(value) => value
            .get(USERS_KEY)?
            .get(0)?
            .get("primary_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        Content::Xml(root) => root
            .child(USERS_KEY)?
            .child("primary_id")
            .map(|id| id.text.clone()),
        Content::Other(_) => None,
    }
}
