//! Request execution: verb plumbing, default-parameter injection, and the
//! full-result pagination driver.

use reqwest::{header, Method};
use serde_json::Value;
use url::Url;

use crate::config::{ConnectionParams, DataFormat};
use crate::payload::Payload;
use crate::query::MAX_LIMIT;
use crate::response::{normalize, Content, RawResponse};
use crate::xml::Element;
use crate::Error;

/// One API connection: the HTTP client plus this sub-client's copy of the
/// connection parameters.
#[derive(Clone, Debug)]
pub(crate) struct Connection {
    params: ConnectionParams,
    http: reqwest::Client,
}

impl Connection {
    pub(crate) fn new(params: ConnectionParams) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(params.user_agent.clone())
            .timeout(params.timeout)
            .build()?;
        Ok(Connection { params, http })
    }

    /// GET and decode. The connection's `format` is appended unless the
    /// caller supplied one.
    pub(crate) async fn get(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Content, Error> {
        let url = self.build_url(path, params, true)?;
        let raw = self.execute(Method::GET, url, None).await?;
        normalize(raw, self.params.xml_ns)
    }

    /// GET without decoding.
    pub(crate) async fn get_raw(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<RawResponse, Error> {
        let url = self.build_url(path, params, true)?;
        self.execute(Method::GET, url, None).await
    }

    pub(crate) async fn post(
        &self,
        path: &str,
        payload: &Payload,
        params: &[(String, String)],
    ) -> Result<Content, Error> {
        let format = self.body_format(params, payload)?;
        let body = payload.serialize(format)?;
        let url = self.build_url(path, params, true)?;
        let raw = self.execute(Method::POST, url, Some((format, body))).await?;
        normalize(raw, self.params.xml_ns)
    }

    /// PUT carries no query parameters at all; the body content type follows
    /// the payload, then the connection default.
    pub(crate) async fn put(&self, path: &str, payload: &Payload) -> Result<Content, Error> {
        let format = payload.implied_format().unwrap_or(self.params.format);
        let body = payload.serialize(format)?;
        let url = self.build_url(path, &[], false)?;
        let raw = self.execute(Method::PUT, url, Some((format, body))).await?;
        normalize(raw, self.params.xml_ns)
    }

    /// DELETE decodes like the other verbs, except that a 204 or empty
    /// success body passes through untouched.
    pub(crate) async fn delete(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Content, Error> {
        let format = match params.iter().find(|(key, _)| key == "format") {
            Some((_, value)) => value.parse()?,
            None => self.params.format,
        };
        let url = self.build_url(path, params, true)?;
        let raw = self
            .execute(Method::DELETE, url, Some((format, String::new())))
            .await?;
        let failed = matches!(raw.status / 100, 4 | 5);
        if !failed && (raw.status == 204 || raw.body.trim().is_empty()) {
            return Ok(Content::Other(raw));
        }
        normalize(raw, self.params.xml_ns)
    }

    /// Repeats a list GET with increasing offsets until the server-reported
    /// total is reached, merging every page into the first. `limit` is the
    /// clamped page size of the first request, which fixes both the starting
    /// offset and the number of follow-up calls.
    pub(crate) async fn get_all(
        &self,
        path: &str,
        params: &[(String, String)],
        limit: i64,
        mut first: Content,
        record_key: &str,
    ) -> Result<Content, Error> {
        let Some(total) = first.total_record_count() else {
            return Ok(first);
        };
        let mut params = params.to_vec();
        set_param(&mut params, "limit", &MAX_LIMIT.to_string());
        let mut offset = limit;
        let mut retrieved = limit;
        while retrieved < total {
            set_param(&mut params, "offset", &offset.to_string());
            tracing::debug!("Fetching {} from offset {} of {} records", path, offset, total);
            let page = self.get(path, &params).await?;
            merge_pages(&mut first, page, record_key)?;
            retrieved += MAX_LIMIT;
            offset += MAX_LIMIT;
        }
        Ok(first)
    }

    /// Raw-mode counterpart of [`get_all`](Self::get_all): one undecoded
    /// response per request, nothing merged. An undecodable first body means
    /// no more pages.
    pub(crate) async fn get_all_raw(
        &self,
        path: &str,
        params: &[(String, String)],
        limit: i64,
        first: RawResponse,
    ) -> Result<Vec<RawResponse>, Error> {
        let total = raw_total(&first).unwrap_or(limit);
        let mut responses = vec![first];
        let mut params = params.to_vec();
        set_param(&mut params, "limit", &MAX_LIMIT.to_string());
        let mut offset = limit;
        let mut retrieved = limit;
        while retrieved < total {
            set_param(&mut params, "offset", &offset.to_string());
            responses.push(self.get_raw(path, &params).await?);
            retrieved += MAX_LIMIT;
            offset += MAX_LIMIT;
        }
        Ok(responses)
    }

    /// Resolution order for a POST body's content type: an explicit `format`
    /// parameter, then the payload's own representation, then the connection
    /// default.
    fn body_format(&self, params: &[(String, String)], payload: &Payload) -> Result<DataFormat, Error> {
        match params.iter().find(|(key, _)| key == "format") {
            Some((_, value)) => value.parse(),
            None => Ok(payload.implied_format().unwrap_or(self.params.format)),
        }
    }

    fn build_url(
        &self,
        path: &str,
        params: &[(String, String)],
        inject_format: bool,
    ) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}{}", self.params.base_url, path))
            .map_err(|e| Error::InvalidArgument(format!("invalid request URL: {e}")))?;
        if !params.is_empty() || inject_format {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            if inject_format && !params.iter().any(|(key, _)| key == "format") {
                pairs.append_pair("format", self.params.format.as_str());
            }
        }
        Ok(url)
    }

    /// Sends the request and captures an owned snapshot of the reply. The
    /// API key travels in the `authorization` header, never in the URL.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<(DataFormat, String)>,
    ) -> Result<RawResponse, Error> {
        let mut request = self.http.request(method, url).header(
            header::AUTHORIZATION,
            format!("apikey {}", self.params.api_key),
        );
        if let Some((format, text)) = body {
            request = request.header(header::CONTENT_TYPE, format.mime()).body(text);
        }
        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send request: {}", e);
            Error::Http(e)
        })?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        Ok(RawResponse {
            status,
            url,
            content_type,
            body,
        })
    }
}

/// Best-effort total for raw mode.
fn raw_total(raw: &RawResponse) -> Option<i64> {
    let media = raw.content_type.as_deref()?.split(';').next()?.trim();
    match media {
        "application/json" => {
            let value: Value = serde_json::from_str(&raw.body).ok()?;
            Content::Json(value).total_record_count()
        }
        "application/xml" => {
            let root = Element::parse(&raw.body).ok()?;
            Content::Xml(root).total_record_count()
        }
        _ => None,
    }
}

/// Appends every record of `page` under `record_key` onto the accumulated
/// first page.
fn merge_pages(acc: &mut Content, page: Content, record_key: &str) -> Result<(), Error> {
    match (acc, page) {
        (Content::Json(acc), Content::Json(page)) => {
            let Some(new_rows) = page.get(record_key).and_then(Value::as_array) else {
                return Ok(());
            };
            match acc.get_mut(record_key).and_then(Value::as_array_mut) {
                Some(rows) => rows.extend(new_rows.iter().cloned()),
                None => {
                    if let Some(object) = acc.as_object_mut() {
                        object.insert(record_key.to_string(), Value::Array(new_rows.clone()));
                    }
                }
            }
            Ok(())
        }
        (Content::Xml(acc), Content::Xml(page)) => {
            for child in page.children {
                acc.append(child);
            }
            Ok(())
        }
        _ => Err(Error::UnexpectedResponse(
            "paged responses switched representation mid-retrieval".to_string(),
        )),
    }
}

fn set_param(params: &mut Vec<(String, String)>, key: &str, value: &str) {
    match params.iter_mut().find(|(k, _)| k == key) {
        Some(pair) => pair.1 = value.to_string(),
        None => params.push((key.to_string(), value.to_string())),
    }
}
