//! Redirect target resolution: the lander vs. direct-to-offer decision and
//! destination URL construction.

use url::Url;

use crate::click::SUB_COUNT;
use crate::entities::{Campaign, Lander, Offer};
use crate::error::TrackError;
use crate::macros::{self, MacroValues};

/// Where a tracking hit redirects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    /// Landing page first; the click waits for a lander-view event.
    Lander(String),
    /// Straight to the offer — terminal.
    Offer(String),
}

impl RedirectTarget {
    pub fn url(&self) -> &str {
        match self {
            Self::Lander(u) | Self::Offer(u) => u,
        }
    }
}

/// Decide the next hop for a freshly recorded click.
///
/// Lander wins when the campaign has one and direct linking is off;
/// otherwise the offer; otherwise there is nowhere to send the visitor and
/// the caller surfaces 404 — the click row itself is already persisted and
/// stays that way.
pub fn resolve_target(
    campaign: &Campaign,
    lander: Option<&Lander>,
    offer: Option<&Offer>,
    click_id: &str,
    subs: &[Option<String>],
    values: &MacroValues,
) -> Result<RedirectTarget, TrackError> {
    if !campaign.direct_linking {
        if let Some(lander) = lander {
            return Ok(RedirectTarget::Lander(build_lander_url(
                &lander.url,
                click_id,
                subs,
            )?));
        }
    }
    if let Some(offer) = offer {
        return Ok(RedirectTarget::Offer(build_offer_url(&offer.url, values)?));
    }
    Err(TrackError::NoRedirectTarget(campaign.unique_id.clone()))
}

/// Lander URL: base + `click_id` + every populated sub as canonical
/// `sub{N}` query parameters, so the lander can echo them back on lpclick.
pub fn build_lander_url(
    base: &str,
    click_id: &str,
    subs: &[Option<String>],
) -> Result<String, TrackError> {
    let mut url =
        Url::parse(base).map_err(|_| TrackError::InvalidTemplate(base.to_string()))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("click_id", click_id);
        for n in 1..=SUB_COUNT.min(subs.len()) {
            if let Some(v) = subs[n - 1].as_deref() {
                pairs.append_pair(&format!("sub{n}"), v);
            }
        }
    }
    Ok(url.into())
}

/// Offer URL: macro-resolve the tracking template, then validate the result
/// actually parses as a URL.
pub fn build_offer_url(template: &str, values: &MacroValues) -> Result<String, TrackError> {
    let resolved = macros::resolve(template, values);
    Url::parse(&resolved).map_err(|_| TrackError::InvalidTemplate(resolved.clone()))?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::MacroKey;

    fn campaign(direct_linking: bool) -> Campaign {
        Campaign {
            id: 1,
            unique_id: "cmp_abc123".to_string(),
            name: "Test".to_string(),
            traffic_channel_id: Some(9),
            lander_id: Some(3),
            offer_id: Some(4),
            direct_linking,
            is_active: true,
            promoting_url: String::new(),
            created_at: String::new(),
        }
    }

    fn lander() -> Lander {
        Lander {
            id: 3,
            name: "LP".to_string(),
            url: "https://lp.example/page".to_string(),
            created_at: String::new(),
        }
    }

    fn offer() -> Offer {
        Offer {
            id: 4,
            name: "Offer".to_string(),
            url: "https://offers.example/go?cid={click_id}&s={sub1}".to_string(),
            payout: 10.0,
            offer_source_id: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn lander_path_appends_click_id_and_subs() {
        let mut subs = vec![None; SUB_COUNT];
        subs[0] = Some("xyz".to_string());
        let target = resolve_target(
            &campaign(false),
            Some(&lander()),
            Some(&offer()),
            "clk_1",
            &subs,
            &MacroValues::new(),
        )
        .expect("target");
        match target {
            RedirectTarget::Lander(url) => {
                assert!(url.contains("click_id=clk_1"));
                assert!(url.contains("sub1=xyz"));
            }
            other => panic!("expected lander, got {other:?}"),
        }
    }

    #[test]
    fn direct_linking_skips_lander() {
        let mut values = MacroValues::new();
        values.set(MacroKey::ClickId, "clk_1");
        values.set(MacroKey::Sub(1), "fb");
        let target = resolve_target(
            &campaign(true),
            Some(&lander()),
            Some(&offer()),
            "clk_1",
            &[],
            &values,
        )
        .expect("target");
        assert_eq!(
            target,
            RedirectTarget::Offer("https://offers.example/go?cid=clk_1&s=fb".to_string())
        );
    }

    #[test]
    fn no_lander_no_offer_is_an_error() {
        let err = resolve_target(&campaign(false), None, None, "clk_1", &[], &MacroValues::new())
            .unwrap_err();
        assert!(matches!(err, TrackError::NoRedirectTarget(_)));
    }

    #[test]
    fn unparseable_offer_template_fails() {
        let err = build_offer_url("not a url {click_id}", &MacroValues::new()).unwrap_err();
        assert!(matches!(err, TrackError::InvalidTemplate(_)));
    }
}
