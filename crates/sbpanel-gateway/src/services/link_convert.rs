//! Share link → outbound conversion
//!
//! Supported schemes: `vless://`, `vmess://`, `trojan://`, `ss://`,
//! `hysteria2://` (alias `hy2://`). The result is an outbound object in the
//! proxy core's JSON format, ready to be saved under `outbounds`.

use std::collections::HashMap;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::{json, Map, Value};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum LinkError {
    #[error("unsupported link scheme: {0}")]
    UnsupportedScheme(String),

    #[error("malformed link: {0}")]
    Malformed(String),
}

type LinkResult<T> = Result<T, LinkError>;

/// Convert a share link to an outbound object
pub fn convert(link: &str) -> LinkResult<Value> {
    let link = link.trim();
    let scheme = link
        .split_once("://")
        .map(|(s, _)| s.to_ascii_lowercase())
        .ok_or_else(|| LinkError::Malformed("missing scheme".into()))?;

    match scheme.as_str() {
        "vmess" => vmess(link),
        "ss" => shadowsocks(link),
        "vless" | "trojan" | "hysteria2" | "hy2" => {
            let url = Url::parse(link).map_err(|e| LinkError::Malformed(e.to_string()))?;
            match scheme.as_str() {
                "vless" => vless(&url),
                "trojan" => trojan(&url),
                _ => hysteria2(&url),
            }
        }
        other => Err(LinkError::UnsupportedScheme(other.to_string())),
    }
}

fn decode_b64(input: &str) -> LinkResult<Vec<u8>> {
    let trimmed = input.trim().trim_end_matches('=');
    STANDARD_NO_PAD
        .decode(trimmed)
        .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed))
        .map_err(|_| LinkError::Malformed("invalid base64 payload".into()))
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn host(url: &Url) -> LinkResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| LinkError::Malformed("missing host".into()))?;
    Ok(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

fn port(url: &Url) -> LinkResult<u16> {
    url.port()
        .ok_or_else(|| LinkError::Malformed("missing port".into()))
}

fn tag(url: &Url, fallback: &str) -> String {
    url.fragment()
        .map(decode_component)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

fn get<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// `security` / `sni` / `fp` / `pbk` / `sid` / `alpn` / `allowInsecure`
fn tls(params: &HashMap<String, String>, server: &str, force: bool) -> Option<Value> {
    let security = get(params, "security").unwrap_or(if force { "tls" } else { "none" });
    if security != "tls" && security != "reality" {
        return None;
    }

    let mut tls = Map::new();
    tls.insert("enabled".into(), json!(true));
    tls.insert(
        "server_name".into(),
        json!(get(params, "sni").or(get(params, "peer")).unwrap_or(server)),
    );
    let insecure = get(params, "allowInsecure")
        .or(get(params, "insecure"))
        .map(|v| v == "1" || v == "true");
    if insecure == Some(true) {
        tls.insert("insecure".into(), json!(true));
    }
    if let Some(alpn) = get(params, "alpn") {
        let alpn: Vec<&str> = alpn.split(',').collect();
        tls.insert("alpn".into(), json!(alpn));
    }
    if let Some(fp) = get(params, "fp") {
        tls.insert("utls".into(), json!({ "enabled": true, "fingerprint": fp }));
    }
    if security == "reality" {
        tls.insert(
            "reality".into(),
            json!({
                "enabled": true,
                "public_key": get(params, "pbk").unwrap_or_default(),
                "short_id": get(params, "sid").unwrap_or_default(),
            }),
        );
    }
    Some(Value::Object(tls))
}

/// `type` / `path` / `host` / `serviceName`
fn transport(params: &HashMap<String, String>) -> Option<Value> {
    match get(params, "type").unwrap_or("tcp") {
        "ws" => {
            let mut ws = json!({ "type": "ws", "path": get(params, "path").unwrap_or("/") });
            if let Some(host) = get(params, "host") {
                ws["headers"] = json!({ "Host": host });
            }
            Some(ws)
        }
        "grpc" => Some(json!({
            "type": "grpc",
            "service_name": get(params, "serviceName").unwrap_or_default(),
        })),
        "http" | "h2" => {
            let mut http = json!({ "type": "http", "path": get(params, "path").unwrap_or("/") });
            if let Some(host) = get(params, "host") {
                http["host"] = json!(host.split(',').collect::<Vec<_>>());
            }
            Some(http)
        }
        "httpupgrade" => Some(json!({
            "type": "httpupgrade",
            "path": get(params, "path").unwrap_or("/"),
            "host": get(params, "host").unwrap_or_default(),
        })),
        _ => None,
    }
}

fn finish(mut outbound: Value, tls: Option<Value>, transport: Option<Value>) -> Value {
    if let Some(tls) = tls {
        outbound["tls"] = tls;
    }
    if let Some(transport) = transport {
        outbound["transport"] = transport;
    }
    outbound
}

fn vless(url: &Url) -> LinkResult<Value> {
    let server = host(url)?;
    let params = query(url);
    let uuid = decode_component(url.username());
    if uuid.is_empty() {
        return Err(LinkError::Malformed("missing uuid".into()));
    }

    let mut outbound = json!({
        "type": "vless",
        "tag": tag(url, "vless"),
        "server": server,
        "server_port": port(url)?,
        "uuid": uuid,
    });
    if let Some(flow) = get(&params, "flow") {
        outbound["flow"] = json!(flow);
    }

    Ok(finish(
        outbound,
        tls(&params, &server, false),
        transport(&params),
    ))
}

fn trojan(url: &Url) -> LinkResult<Value> {
    let server = host(url)?;
    let params = query(url);
    let password = decode_component(url.username());
    if password.is_empty() {
        return Err(LinkError::Malformed("missing password".into()));
    }

    let outbound = json!({
        "type": "trojan",
        "tag": tag(url, "trojan"),
        "server": server,
        "server_port": port(url)?,
        "password": password,
    });

    Ok(finish(
        outbound,
        tls(&params, &server, true),
        transport(&params),
    ))
}

fn hysteria2(url: &Url) -> LinkResult<Value> {
    let server = host(url)?;
    let params = query(url);

    let mut password = decode_component(url.username());
    if let Some(secret) = url.password() {
        password = format!("{}:{}", password, decode_component(secret));
    }

    let mut outbound = json!({
        "type": "hysteria2",
        "tag": tag(url, "hysteria2"),
        "server": server,
        "server_port": port(url)?,
        "password": password,
    });
    if let Some(obfs) = get(&params, "obfs") {
        outbound["obfs"] = json!({
            "type": obfs,
            "password": get(&params, "obfs-password").unwrap_or_default(),
        });
    }

    Ok(finish(outbound, tls(&params, &server, true), None))
}

fn vmess(link: &str) -> LinkResult<Value> {
    let payload = &link["vmess://".len()..];
    let raw = decode_b64(payload)?;
    let doc: Value = serde_json::from_slice(&raw)
        .map_err(|e| LinkError::Malformed(format!("vmess payload: {}", e)))?;

    let text = |key: &str| -> String {
        match doc.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    };

    let server = text("add");
    let server_port: u16 = text("port")
        .parse()
        .map_err(|_| LinkError::Malformed("vmess port".into()))?;
    if server.is_empty() || text("id").is_empty() {
        return Err(LinkError::Malformed("vmess server or id missing".into()));
    }

    let tag = Some(text("ps"))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "vmess".to_string());
    let security = Some(text("scy"))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "auto".to_string());

    let mut params = HashMap::new();
    for (from, to) in [
        ("net", "type"),
        ("path", "path"),
        ("host", "host"),
        ("sni", "sni"),
        ("alpn", "alpn"),
        ("fp", "fp"),
        ("tls", "security"),
    ] {
        let value = text(from);
        if !value.is_empty() {
            params.insert(to.to_string(), value);
        }
    }
    if params.get("type").map(String::as_str) == Some("grpc") {
        if let Some(path) = params.get("path").cloned() {
            params.insert("serviceName".to_string(), path);
        }
    }

    let outbound = json!({
        "type": "vmess",
        "tag": tag,
        "server": server,
        "server_port": server_port,
        "uuid": text("id"),
        "alter_id": text("aid").parse::<u32>().unwrap_or(0),
        "security": security,
    });

    Ok(finish(
        outbound,
        tls(&params, &server, false),
        transport(&params),
    ))
}

/// SIP002 (`ss://base64(method:password)@host:port#tag`) and the legacy
/// fully-encoded form (`ss://base64(method:password@host:port)#tag`)
fn shadowsocks(link: &str) -> LinkResult<Value> {
    let body = &link["ss://".len()..];
    let (body, fragment) = match body.split_once('#') {
        Some((b, f)) => (b, Some(decode_component(f))),
        None => (body, None),
    };
    let body = body.split_once('?').map(|(b, _)| b).unwrap_or(body);

    let (userinfo, hostport) = match body.rsplit_once('@') {
        Some((user, hp)) => {
            let user = decode_component(user);
            let user = match decode_b64(&user) {
                Ok(bytes) => String::from_utf8(bytes)
                    .map_err(|_| LinkError::Malformed("ss userinfo".into()))?,
                Err(_) => user,
            };
            (user, hp.to_string())
        }
        None => {
            let decoded = String::from_utf8(decode_b64(body)?)
                .map_err(|_| LinkError::Malformed("ss payload".into()))?;
            let (user, hp) = decoded
                .rsplit_once('@')
                .ok_or_else(|| LinkError::Malformed("ss server missing".into()))?;
            (user.to_string(), hp.to_string())
        }
    };

    let (method, password) = userinfo
        .split_once(':')
        .ok_or_else(|| LinkError::Malformed("ss method:password".into()))?;
    let (server, port) = hostport
        .rsplit_once(':')
        .ok_or_else(|| LinkError::Malformed("ss port missing".into()))?;
    let port: u16 = port
        .trim_end_matches('/')
        .parse()
        .map_err(|_| LinkError::Malformed("ss port".into()))?;

    Ok(json!({
        "type": "shadowsocks",
        "tag": fragment.filter(|t| !t.is_empty()).unwrap_or_else(|| "shadowsocks".to_string()),
        "server": server.trim_start_matches('[').trim_end_matches(']'),
        "server_port": port,
        "method": method,
        "password": password,
    }))
}
