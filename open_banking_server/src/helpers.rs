use std::{net::IpAddr, str::FromStr, sync::OnceLock};

use actix_web::HttpRequest;
use log::{debug, trace};
use regex::Regex;

pub const TPP_ID_HEADER: &str = "x-tpp-id";
pub const INTERACTION_ID_HEADER: &str = "x-fapi-interaction-id";
/// Set by the upstream identity provider once the end-user has logged in.
pub const PSU_ID_HEADER: &str = "psu-id";

/// A non-empty, trimmed header value.
pub fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|s| !s.is_empty())
}

pub fn tpp_id(req: &HttpRequest) -> Option<&str> {
    header_str(req, TPP_ID_HEADER)
}

pub fn psu_id(req: &HttpRequest) -> Option<&str> {
    header_str(req, PSU_ID_HEADER)
}

fn forwarded_for_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"for="?\[?(?P<ip>[^;,"\]]+)"#).ok()).as_ref()
}

fn parse_ip(s: &str) -> Option<IpAddr> {
    let s = s.trim();
    IpAddr::from_str(s).ok().or_else(|| std::net::SocketAddr::from_str(s).ok().map(|a| a.ip()))
}

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = header_str(req, "X-Forwarded-For").and_then(|s| s.split(',').next()).and_then(parse_ip);
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = header_str(req, "Forwarded")
            .zip(forwarded_for_regex())
            .and_then(|(v, re)| re.captures(v))
            .and_then(|caps| caps.name("ip"))
            .and_then(|m| parse_ip(m.as_str()));
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.and_then(|s| parse_ip(&s))
    })
}
