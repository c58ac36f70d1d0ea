//! Coarse user-agent classification for analytics rows.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub device: &'static str,
    pub browser: &'static str,
    pub os: &'static str,
}

pub fn parse(user_agent: &str) -> ClientInfo {
    let ua = user_agent.to_ascii_lowercase();
    ClientInfo {
        device: device(&ua),
        browser: browser(&ua),
        os: os(&ua),
    }
}

fn device(ua: &str) -> &'static str {
    const BOTS: &[&str] = &["bot", "crawler", "spider", "slurp", "curl", "wget", "preview"];
    if BOTS.iter().any(|b| ua.contains(b)) {
        "bot"
    } else if ua.contains("ipad") || ua.contains("tablet") || (ua.contains("android") && !ua.contains("mobile")) {
        "tablet"
    } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("ipod") {
        "mobile"
    } else {
        "desktop"
    }
}

// Order matters: Edge and Opera also advertise Chrome, Chrome advertises Safari.
fn browser(ua: &str) -> &'static str {
    if ua.contains("edg/") || ua.contains("edge/") {
        "Edge"
    } else if ua.contains("opr/") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("firefox/") || ua.contains("fxios/") {
        "Firefox"
    } else if ua.contains("chrome/") || ua.contains("crios/") {
        "Chrome"
    } else if ua.contains("safari/") {
        "Safari"
    } else if ua.contains("msie") || ua.contains("trident/") {
        "Internet Explorer"
    } else {
        "Other"
    }
}

fn os(ua: &str) -> &'static str {
    if ua.contains("windows") {
        "Windows"
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        "iOS"
    } else if ua.contains("mac os x") || ua.contains("macintosh") {
        "macOS"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("linux") || ua.contains("x11") {
        "Linux"
    } else {
        "Other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
    const EDGE_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
    const FIREFOX_LINUX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn chrome_on_windows() {
        assert_eq!(
            parse(CHROME_WINDOWS),
            ClientInfo {
                device: "desktop",
                browser: "Chrome",
                os: "Windows"
            }
        );
    }

    #[test]
    fn safari_on_iphone_is_mobile_ios() {
        let info = parse(SAFARI_IPHONE);
        assert_eq!(info.device, "mobile");
        assert_eq!(info.browser, "Safari");
        assert_eq!(info.os, "iOS");
    }

    #[test]
    fn edge_wins_over_chrome() {
        let info = parse(EDGE_MAC);
        assert_eq!(info.browser, "Edge");
        assert_eq!(info.os, "macOS");
    }

    #[test]
    fn firefox_on_linux() {
        let info = parse(FIREFOX_LINUX);
        assert_eq!(info.browser, "Firefox");
        assert_eq!(info.os, "Linux");
    }

    #[test]
    fn android_without_mobile_is_tablet() {
        let info = parse(ANDROID_TABLET);
        assert_eq!(info.device, "tablet");
        assert_eq!(info.os, "Android");
    }

    #[test]
    fn crawlers_are_bots() {
        assert_eq!(parse(GOOGLEBOT).device, "bot");
        assert_eq!(parse("curl/8.4.0").device, "bot");
    }

    #[test]
    fn empty_agent_is_other_desktop() {
        let info = parse("");
        assert_eq!(info.device, "desktop");
        assert_eq!(info.browser, "Other");
        assert_eq!(info.os, "Other");
    }
}
