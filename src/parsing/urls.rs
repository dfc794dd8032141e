//! Turns url references into warnings using the web IO cache.
//!
//! Nothing here blocks. A url whose site info is not cached yet registers a pending operation on
//! the file; the validation context reparses the file once that operation finishes, and the
//! second pass finds the answer in the cache.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use url::Url;

use super::{context::ParsingContext, result::Reference};
use crate::{
    warnings::WarningId,
    webio::{is_documentation_hostname, CleanUrl, SiteInfo, SiteLookup, WebIoController},
};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email pattern is valid")
});

pub fn is_valid_email(address: &str) -> bool {
    let address = address.split('?').next().unwrap_or_default();
    EMAIL.is_match(address)
}

/// Placeholder urls such as `https://<your-host>/...` are documentation, not links.
fn is_placeholder(raw: &str) -> bool {
    if raw.contains("...") {
        return true;
    }
    match (raw.find('<'), raw.rfind('>')) {
        (Some(open), Some(close)) => open < close,
        _ => false,
    }
}

pub fn process_url(ctx: &mut ParsingContext<'_>, reference: &Reference) {
    let raw = reference.raw.trim();
    if is_placeholder(raw) {
        return;
    }
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            tracing::trace!("[Parsing] `{}` does not parse as a url: {}", raw, e);
            ctx.report_warning(
                WarningId::InvalidUrlFormat,
                reference.span,
                &reference.raw,
                format!("`{raw}` is not a valid url"),
            );
            return;
        }
    };
    if is_documentation_hostname(&url) {
        return;
    }
    let clean = CleanUrl::new(url.clone());
    if clean.host_is_ip() {
        ctx.report_warning(
            WarningId::UrlHostnameIsIp,
            reference.span,
            &reference.raw,
            "Use a hostname instead of an IP address",
        );
    }
    if !matches!(url.scheme(), "http" | "https") {
        return;
    }

    let web_io = ctx.web_io();
    match lookup_or_request(ctx, &web_io, &url) {
        None | Some(SiteLookup::WebIoDisabled) | Some(SiteLookup::Unknown) => {}
        Some(SiteLookup::UnresolvableHostname) => report_unresolvable(ctx, reference, &clean),
        Some(SiteLookup::Cached(info)) => interpret_site_info(ctx, reference, &web_io, info),
    }
}

/// Cache lookup that requests `url` when it is unknown. Returns `None` when the request is
/// outstanding, in which case its operation is registered on the file.
///
/// The request can settle between the lookup and the request call, in which case the
/// controller hands back a finished operation and the cache is consulted again.
fn lookup_or_request(
    ctx: &mut ParsingContext<'_>,
    web_io: &WebIoController,
    url: &Url,
) -> Option<SiteLookup> {
    match web_io.try_get_site_info(url) {
        SiteLookup::Unknown => {
            let operation = web_io.request_site_info(url);
            if !operation.is_finished() {
                ctx.register_pending_operation(operation);
                return None;
            }
            tracing::trace!("[Parsing] {} settled while being requested", url);
            Some(web_io.try_get_site_info(url))
        }
        lookup => Some(lookup),
    }
}

fn report_unresolvable(ctx: &mut ParsingContext<'_>, reference: &Reference, url: &CleanUrl) {
    let host = url.url().host_str().unwrap_or_default().to_string();
    ctx.report_warning(
        WarningId::UnresolvableHostname,
        reference.span,
        &reference.raw,
        format!("Could not resolve the hostname `{host}`"),
    );
}

/// Report failures and timeouts. Returns true if `info` carried one.
fn report_request_failure(
    ctx: &mut ParsingContext<'_>,
    reference: &Reference,
    info: &SiteInfo,
) -> bool {
    let url = info.url.absolute_url_without_fragment();
    if info.request_timed_out {
        let timeout = ctx.pipeline.config.web_io.request_timeout_ms.unwrap_or(0);
        ctx.report_warning(
            WarningId::WebRequestTimedOut,
            reference.span,
            &reference.raw,
            format!("Web request to `{url}` timed out ({timeout} ms)"),
        );
        return true;
    }
    if info.request_failed {
        ctx.report_warning(
            WarningId::WebRequestFailed,
            reference.span,
            &reference.raw,
            format!("Web request to `{url}` failed"),
        );
        return true;
    }
    false
}

fn interpret_site_info(
    ctx: &mut ParsingContext<'_>,
    reference: &Reference,
    web_io: &WebIoController,
    info: Arc<SiteInfo>,
) {
    if report_request_failure(ctx, reference, &info) {
        return;
    }
    if !info.is_redirect {
        if !info.is_2xx() {
            ctx.report_warning(
                WarningId::WebRequestReturnedErrorCode,
                reference.span,
                &reference.raw,
                format!(
                    "Request to `{}` returned a non-successful status code ({})",
                    info.url.absolute_url_without_fragment(),
                    info.status_code()
                ),
            );
        }
        return;
    }

    let allowed = ctx.pipeline.config.web_io.maximum_redirect_count;
    let origin = info.url.absolute_url_without_fragment();
    let mut chain = vec![info];
    loop {
        if chain.len() > allowed {
            ctx.report_warning(
                WarningId::TooManyRedirects,
                reference.span,
                &reference.raw,
                format!("`{origin}` redirected more times than is allowed by the config ({allowed})"),
            );
            return;
        }
        let Some(target) = chain.last().and_then(|last| last.redirect_target.clone()) else {
            return;
        };
        let next = match lookup_or_request(ctx, web_io, target.url()) {
            Some(SiteLookup::Cached(next)) => next,
            Some(SiteLookup::UnresolvableHostname) => {
                report_unresolvable(ctx, reference, &target);
                return;
            }
            None | Some(SiteLookup::Unknown) | Some(SiteLookup::WebIoDisabled) => return,
        };

        if report_request_failure(ctx, reference, &next) {
            return;
        }
        if next.is_redirect {
            chain.push(next);
            continue;
        }

        let target_url = next.url.absolute_url_without_fragment();
        if next.is_2xx() {
            let mut message = format!("`{origin}` redirected to `{target_url}`");
            if chain.len() > 1 {
                message.push_str(&format!(" and {} more location(s)", chain.len() - 1));
            }
            ctx.report_warning(
                WarningId::RedirectChain,
                reference.span,
                &reference.raw,
                message,
            );
        } else {
            ctx.report_warning(
                WarningId::WebRequestReturnedErrorCode,
                reference.span,
                &reference.raw,
                format!(
                    "Request to `{}` (redirect from `{}`) returned a non-successful status code ({})",
                    target_url,
                    origin,
                    next.status_code()
                ),
            );
        }
        return;
    }
}
