//! Exports parsing and the per-request access gate.
//!
//! An exports source is one entry per line:
//!
//! ```text
//! /srv/data 10.0.0.0/24(rw,no_root_squash) backup.example.com(ro)
//! ```
//!
//! Host specs are a hostname, a literal IPv4 address, `addr/bits`, or
//! `addr/mask`; a parenthesised option list with no host applies to any
//! client. Entries with no host at all get the anonymous read-only,
//! root-squashed default. `#` starts a comment.

use std::net::Ipv4Addr;

use anyhow::{anyhow, bail};
use tracing::warn;

use crate::backend::FSBackend;
use crate::protocol::xdr::mount;
use crate::protocol::xdr::nfs3::{nfsstat3, NFS_MAXPATHLEN};
use crate::protocol::xdr::rpc::auth_unix;

pub const OPT_NO_ROOT_SQUASH: u32 = 1;
pub const OPT_ALL_SQUASH: u32 = 2;
pub const OPT_RW: u32 = 4;
pub const OPT_REMOVABLE: u32 = 8;
pub const OPT_INSECURE: u32 = 16;

/// anonuid/anongid value meaning "no override configured".
pub const ANON_NOTSPECIAL: u32 = 0xFFFF_FFFF;

/// Identity unprivileged squashed callers map to ("nobody").
const ANON_DEFAULT_ID: u32 = 65534;

/// One host clause of an export entry.
#[derive(Clone, Debug)]
pub struct ExportHost {
    /// The spec as written, reported back by the EXPORT procedure.
    pub orig: String,
    pub addr: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub options: u32,
    pub anonuid: u32,
    pub anongid: u32,
}

impl ExportHost {
    fn anonymous() -> ExportHost {
        ExportHost {
            orig: "<anon clnt>".to_string(),
            addr: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            options: 0,
            anonuid: ANON_NOTSPECIAL,
            anongid: ANON_NOTSPECIAL,
        }
    }

    fn matches(&self, client: Ipv4Addr) -> bool {
        let client = u32::from(client);
        let mask = u32::from(self.mask);
        client & mask == u32::from(self.addr)
    }
}

/// One export entry: a canonical path and the hosts it is offered to.
#[derive(Clone, Debug)]
pub struct ExportItem {
    /// Canonical path used for matching.
    pub path: String,
    /// Path as typed; feeds the fsid and the EXPORT listing.
    pub orig: String,
    pub fsid: u32,
    pub hosts: Vec<ExportHost>,
}

/// Effective options of a matched request.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub options: u32,
    pub anonuid: u32,
    pub anongid: u32,
    pub fsid: u32,
    /// Canonical path of the matched export.
    pub path: String,
}

/// Parsed export list for one configuration generation. Reloading builds a
/// new table and swaps it in whole; readers keep the generation they started
/// with.
#[derive(Clone, Debug, Default)]
pub struct ExportTable {
    items: Vec<ExportItem>,
}

/// The FNV1a-32 hash algorithm.
pub fn fnv1a_32(bytes: &[u8], mut hval: u32) -> u32 {
    const FNV_32_PRIME: u32 = 0x0100_0193;
    for byte in bytes {
        hval ^= u32::from(*byte);
        hval = hval.wrapping_mul(FNV_32_PRIME);
    }
    hval
}

/// fsid of an export point: 31 bits of path hash with the top bit forced on,
/// stable across restarts.
fn export_fsid(orig: &str) -> u32 {
    fnv1a_32(orig.as_bytes(), 0) | 0x8000_0000
}

/// Lexical normalisation for paths that cannot go through `realpath` (their
/// backing media may be absent): collapses slash runs and strips a trailing
/// slash. `/x/y` must be a prefix of any spelling of `///x//y/`.
pub fn normpath(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut last_slash = false;
    for c in path.chars() {
        if c == '/' && last_slash {
            continue;
        }
        last_slash = c == '/';
        normalized.push(c);
    }
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

fn netmask(bits: u32) -> Ipv4Addr {
    let raw = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
    Ipv4Addr::from(raw)
}

async fn resolve_hostname(name: &str) -> anyhow::Result<Ipv4Addr> {
    let addrs = tokio::net::lookup_host((name, 0))
        .await
        .map_err(|e| anyhow!("could not resolve hostname '{name}': {e}"))?;
    for addr in addrs {
        if let std::net::IpAddr::V4(v4) = addr.ip() {
            return Ok(v4);
        }
    }
    bail!("hostname '{name}' has no IPv4 address");
}

async fn parse_hostspec(spec: &str) -> anyhow::Result<(Ipv4Addr, Ipv4Addr)> {
    if spec.is_empty() {
        return Ok((Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED));
    }
    if let Some((addr, mask)) = spec.split_once('/') {
        let addr: Ipv4Addr =
            addr.parse().map_err(|_| anyhow!("bad network address '{addr}'"))?;
        let mask = if let Ok(bits) = mask.parse::<u32>() {
            if bits > 32 {
                bail!("bad prefix length '{mask}'");
            }
            netmask(bits)
        } else {
            mask.parse().map_err(|_| anyhow!("bad netmask '{mask}'"))?
        };
        return Ok((addr, mask));
    }
    if let Ok(addr) = spec.parse::<Ipv4Addr>() {
        return Ok((addr, Ipv4Addr::BROADCAST));
    }
    Ok((resolve_hostname(spec).await?, Ipv4Addr::BROADCAST))
}

fn apply_option(host: &mut ExportHost, opt: &str) {
    if let Some((key, value)) = opt.split_once('=') {
        match (key, value.parse::<u32>()) {
            ("anonuid", Ok(id)) => host.anonuid = id,
            ("anongid", Ok(id)) => host.anongid = id,
            _ => warn!("unknown exports option `{opt}' ignored"),
        }
        return;
    }
    match opt {
        "no_root_squash" => host.options |= OPT_NO_ROOT_SQUASH,
        "root_squash" => host.options &= !OPT_NO_ROOT_SQUASH,
        "all_squash" => host.options |= OPT_ALL_SQUASH,
        "no_all_squash" => host.options &= !OPT_ALL_SQUASH,
        "rw" => host.options |= OPT_RW,
        "ro" => host.options &= !OPT_RW,
        "removable" => host.options |= OPT_REMOVABLE,
        "fixed" => host.options &= !OPT_REMOVABLE,
        "insecure" => host.options |= OPT_INSECURE,
        "secure" => host.options &= !OPT_INSECURE,
        "" => {}
        _ => warn!("unknown exports option `{opt}' ignored"),
    }
}

async fn parse_host_clause(token: &str) -> anyhow::Result<ExportHost> {
    let (spec, opts) = match token.split_once('(') {
        Some((spec, rest)) => {
            let opts = rest
                .strip_suffix(')')
                .ok_or_else(|| anyhow!("unterminated option list in '{token}'"))?;
            (spec, opts)
        }
        None => (token, ""),
    };

    let (addr, mask) = parse_hostspec(spec).await?;
    let mut host = ExportHost::anonymous();
    if !spec.is_empty() {
        host.orig = spec.to_string();
    }
    host.addr = addr;
    host.mask = mask;
    for opt in opts.split(',') {
        apply_option(&mut host, opt.trim());
    }
    Ok(host)
}

impl ExportTable {
    /// Parses an exports source. Any malformed entry fails the whole parse so
    /// a reload never half-applies.
    pub async fn parse(source: &str, backend: &dyn FSBackend) -> anyhow::Result<ExportTable> {
        let mut items = Vec::new();

        for (lineno, line) in source.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(orig) = tokens.next() else { continue };

            let mut hosts = Vec::new();
            for token in tokens {
                let host = parse_host_clause(token)
                    .await
                    .map_err(|e| anyhow!("exports line {}: {e}", lineno + 1))?;
                hosts.push(host);
            }
            if hosts.is_empty() {
                hosts.push(ExportHost::anonymous());
            }

            // Exports whose media may be absent cannot be canonicalised.
            let removable_for_all = hosts.iter().all(|h| h.options & OPT_REMOVABLE != 0);
            let path = if removable_for_all {
                normpath(orig)
            } else {
                backend.realpath(orig).await.map_err(|e| {
                    anyhow!("exports line {}: realpath for {orig} failed: {e:?}", lineno + 1)
                })?
            };

            if path.len() + 1 > NFS_MAXPATHLEN {
                bail!("exports line {}: export path too long", lineno + 1);
            }

            items.push(ExportItem {
                path,
                orig: orig.to_string(),
                fsid: export_fsid(orig),
                hosts,
            });
        }

        Ok(ExportTable { items })
    }

    pub fn items(&self) -> &[ExportItem] {
        &self.items
    }

    /// Effective options for `path` as seen by `client`: the export whose
    /// canonical path is the longest prefix of `path`, then the first host
    /// clause matching the client address. Paths attempting `..` traversal
    /// never match.
    pub fn options(&self, path: &str, client: Ipv4Addr) -> Option<ExportOptions> {
        if path.contains("/../") {
            return None;
        }

        let mut best: Option<ExportOptions> = None;
        let mut best_len = 0usize;
        for item in &self.items {
            if item.path.len() <= best_len && best.is_some() {
                continue;
            }
            if !path.starts_with(&item.path) {
                continue;
            }
            if let Some(host) = item.hosts.iter().find(|h| h.matches(client)) {
                best_len = item.path.len();
                best = Some(ExportOptions {
                    options: host.options,
                    anonuid: host.anonuid,
                    anongid: host.anongid,
                    fsid: item.fsid,
                    path: item.path.clone(),
                });
            }
        }
        best
    }

    /// Whether `path` is exactly an export point.
    pub fn export_point(&self, path: &str) -> bool {
        self.items.iter().any(|item| item.path == path)
    }

    /// The mount-protocol view of this table.
    pub fn to_mount_exports(&self) -> mount::exports {
        mount::exports(
            self.items
                .iter()
                .map(|item| mount::exportnode {
                    ex_dir: item.orig.clone().into_bytes(),
                    ex_groups: item
                        .hosts
                        .iter()
                        .map(|host| host.orig.clone().into_bytes())
                        .collect(),
                })
                .collect(),
        )
    }
}

/// RW gate for mutating procedures: unmatched paths and read-only exports
/// both surface as a read-only filesystem.
pub fn exports_rw(opts: Option<&ExportOptions>) -> nfsstat3 {
    match opts {
        Some(opts) if opts.options & OPT_RW != 0 => nfsstat3::NFS3_OK,
        _ => nfsstat3::NFS3ERR_ROFS,
    }
}

/// Effective uid/gid of a caller under the matched export's squash policy.
pub fn squash_ids(auth: &auth_unix, opts: &ExportOptions) -> (u32, u32) {
    let anon_uid = if opts.anonuid != ANON_NOTSPECIAL { opts.anonuid } else { ANON_DEFAULT_ID };
    let anon_gid = if opts.anongid != ANON_NOTSPECIAL { opts.anongid } else { ANON_DEFAULT_ID };

    if opts.options & OPT_ALL_SQUASH != 0 {
        (anon_uid, anon_gid)
    } else if auth.uid == 0 && opts.options & OPT_NO_ROOT_SQUASH == 0 {
        (anon_uid, anon_gid)
    } else {
        (auth.uid, auth.gid)
    }
}
