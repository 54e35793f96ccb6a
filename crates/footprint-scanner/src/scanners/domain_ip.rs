//! Domain and IP analysis.
//!
//! Domains get a registration lookup over RDAP and a DNS sweep. Domains and
//! literal IPs both get a TCP connect scan of common service ports.

use super::{api_client, ScanOutput, Scanner};
use crate::error::{Result, ScannerError};
use async_trait::async_trait;
use footprint_core::{ApiConfig, ScanCategory, ScanningConfig};
use futures::future::join_all;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Ports probed by the connect scan.
pub const COMMON_PORTS: [u16; 14] = [
    21, 22, 25, 80, 110, 143, 443, 465, 587, 993, 995, 3306, 5432, 8080,
];

/// DNS record types collected for a domain.
pub const DNS_RECORD_TYPES: [RecordType; 7] = [
    RecordType::A,
    RecordType::AAAA,
    RecordType::MX,
    RecordType::TXT,
    RecordType::NS,
    RecordType::SOA,
    RecordType::CNAME,
];

/// Registration data for a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registration {
    /// Sponsoring registrar
    pub registrar: Option<String>,
    /// Registration date
    pub creation_date: Option<String>,
    /// Expiration date
    pub expiration_date: Option<String>,
    /// Delegated name servers
    pub name_servers: Vec<String>,
    /// Contact e-mail addresses
    pub emails: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RdapResponse {
    #[serde(default)]
    events: Vec<RdapEvent>,
    #[serde(default)]
    entities: Vec<RdapEntity>,
    #[serde(default)]
    nameservers: Vec<RdapNameserver>,
}

#[derive(Debug, Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    event_action: String,
    #[serde(rename = "eventDate")]
    event_date: String,
}

#[derive(Debug, Deserialize)]
struct RdapEntity {
    #[serde(default)]
    roles: Vec<String>,
    #[serde(rename = "vcardArray")]
    vcard_array: Option<serde_json::Value>,
    #[serde(default)]
    entities: Vec<RdapEntity>,
}

#[derive(Debug, Deserialize)]
struct RdapNameserver {
    #[serde(rename = "ldhName")]
    ldh_name: Option<String>,
}

impl RdapEntity {
    /// Text values of a vCard property (`fn`, `email`, ...).
    fn vcard(&self, property: &str) -> Vec<String> {
        let Some(items) = self
            .vcard_array
            .as_ref()
            .and_then(|v| v.get(1))
            .and_then(|v| v.as_array())
        else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| item.as_array())
            .filter(|item| item.first().and_then(|n| n.as_str()) == Some(property))
            .filter_map(|item| item.get(3).and_then(|v| v.as_str()).map(str::to_string))
            .collect()
    }

    fn walk<'a>(&'a self, out: &mut Vec<&'a RdapEntity>) {
        out.push(self);
        for child in &self.entities {
            child.walk(out);
        }
    }
}

impl From<RdapResponse> for Registration {
    fn from(rdap: RdapResponse) -> Self {
        let event = |action: &str| {
            rdap.events
                .iter()
                .find(|e| e.event_action == action)
                .map(|e| e.event_date.clone())
        };

        let mut entities = Vec::new();
        for entity in &rdap.entities {
            entity.walk(&mut entities);
        }

        let registrar = entities
            .iter()
            .find(|e| e.roles.iter().any(|r| r == "registrar"))
            .and_then(|e| e.vcard("fn").into_iter().next());

        let mut emails: Vec<String> = entities
            .iter()
            .flat_map(|e| e.vcard("email"))
            .map(|e| e.to_lowercase())
            .collect();
        emails.sort();
        emails.dedup();

        let mut name_servers: Vec<String> = rdap
            .nameservers
            .iter()
            .filter_map(|ns| ns.ldh_name.as_ref())
            .map(|ns| ns.trim_end_matches('.').to_lowercase())
            .collect();
        name_servers.sort();
        name_servers.dedup();

        Self {
            creation_date: event("registration"),
            expiration_date: event("expiration"),
            registrar,
            name_servers,
            emails,
        }
    }
}

/// Strip scheme, path and port from user input.
#[must_use]
pub fn normalize_target(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    let host = trimmed.split('/').next().unwrap_or(trimmed);

    // Bracketed IPv6 literals keep their colons
    if let Some(inner) = host.strip_prefix('[') {
        return inner.split(']').next().unwrap_or(inner).to_string();
    }
    if host.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }
    host.split(':')
        .next()
        .unwrap_or(host)
        .trim_end_matches('.')
        .to_lowercase()
}

/// Registration, DNS and open-port analysis of a domain or IP.
pub struct DomainIpScanner {
    client: reqwest::Client,
    rdap_base_url: String,
    port_timeout: Duration,
    port_concurrency: usize,
    ports: Vec<u16>,
    target: String,
}

impl DomainIpScanner {
    /// Bind a target to the configured services.
    pub fn new(apis: &ApiConfig, scanning: &ScanningConfig, target: &str) -> Result<Self> {
        Ok(Self {
            client: api_client(ScanCategory::DomainIp.display_name(), apis, &scanning.user_agent)?,
            rdap_base_url: apis.rdap_base_url.trim_end_matches('/').to_string(),
            port_timeout: Duration::from_millis(scanning.port_scan_timeout_ms),
            port_concurrency: scanning.port_scan_concurrency.max(1),
            ports: COMMON_PORTS.to_vec(),
            target: normalize_target(target),
        })
    }

    /// Scan these ports instead of [`COMMON_PORTS`].
    #[must_use]
    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    /// Registration data over RDAP.
    pub async fn registration(&self) -> Result<Registration> {
        let name = self.name();
        let url = format!("{}/domain/{}", self.rdap_base_url, self.target);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/rdap+json")
            .send()
            .await
            .map_err(|e| ScannerError::from_reqwest(name, "RDAP lookup", e))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(ScannerError::parsing(
                    name,
                    "WHOIS data not found or domain does not exist.",
                ));
            }
            other => {
                return Err(ScannerError::api(
                    name,
                    other.as_u16(),
                    format!("RDAP lookup failed with status {}", other.as_u16()),
                ));
            }
        }

        let rdap: RdapResponse = response.json().await.map_err(|e| ScannerError::Parsing {
            scanner: name.to_string(),
            message: "RDAP response could not be parsed".to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(Registration::from(rdap))
    }

    /// Records of every type in [`DNS_RECORD_TYPES`], sorted.
    ///
    /// A type without records maps to an empty list.
    pub async fn dns_records(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(5);
        opts.attempts = 1;
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);

        let mut records = BTreeMap::new();
        for record_type in DNS_RECORD_TYPES {
            let values = match resolver.lookup(self.target.as_str(), record_type).await {
                Ok(lookup) => {
                    let mut values: Vec<String> = lookup.iter().map(render_rdata).collect();
                    values.sort();
                    values
                }
                Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                    debug!(domain = %self.target, record_type = %record_type, "no records");
                    Vec::new()
                }
                Err(e) => {
                    return Err(ScannerError::Network {
                        scanner: self.name().to_string(),
                        message: format!("DNS error for {record_type} record"),
                        source: Some(Box::new(e)),
                    });
                }
            };
            records.insert(record_type.to_string(), values);
        }
        Ok(records)
    }

    /// Ports that accepted a TCP connection, ascending.
    pub async fn open_ports(&self) -> Vec<u16> {
        let permits = Semaphore::new(self.port_concurrency);
        let checks = self.ports.iter().map(|&port| {
            let permits = &permits;
            async move {
                let _permit = permits.acquire().await.ok()?;
                let connect = TcpStream::connect((self.target.as_str(), port));
                match tokio::time::timeout(self.port_timeout, connect).await {
                    Ok(Ok(_stream)) => Some(port),
                    _ => None,
                }
            }
        });

        let mut open: Vec<u16> = join_all(checks).await.into_iter().flatten().collect();
        open.sort_unstable();
        open
    }
}

fn render_rdata(rdata: &RData) -> String {
    match rdata {
        RData::TXT(txt) => txt
            .txt_data()
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk))
            .collect(),
        other => other.to_string().trim_end_matches('.').to_string(),
    }
}

#[async_trait]
impl Scanner for DomainIpScanner {
    fn category(&self) -> ScanCategory {
        ScanCategory::DomainIp
    }

    async fn scan(&self) -> Result<ScanOutput> {
        if self.target.is_empty() {
            return Err(ScannerError::invalid_input(self.name(), "domain or IP is empty"));
        }

        let mut data = serde_json::Map::new();
        let mut registrar = None;

        if self.target.parse::<IpAddr>().is_err() {
            let registration = self.registration().await?;
            registrar.clone_from(&registration.registrar);
            data.insert(
                "whois".to_string(),
                serde_json::to_value(&registration)
                    .map_err(|e| ScannerError::internal(self.name(), e.to_string()))?,
            );

            let dns = self.dns_records().await?;
            data.insert("dns".to_string(), serde_json::json!(dns));
        }

        let open_ports = self.open_ports().await;
        info!(target = %self.target, open = open_ports.len(), "domain/IP analysis complete");
        data.insert("open_ports".to_string(), serde_json::json!(open_ports));

        let output = ScanOutput::new(serde_json::Value::Object(data));
        Ok(match registrar {
            Some(registrar) => output.with_keyword("registrar", registrar),
            None => output,
        })
    }
}
