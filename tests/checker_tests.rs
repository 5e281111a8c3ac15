//! Integration tests for the checking pipeline
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! page and site checkers end-to-end.

use linkscour::checker::CheckEvent;
use linkscour::config::{CheckOptions, RequestMethod};
use linkscour::{HtmlChecker, HtmlUrlChecker, PageError, SiteChecker, UrlChecker};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Options used across tests: GET everywhere so mocks count one request
/// per check
fn test_options() -> CheckOptions {
    CheckOptions {
        request_method: RequestMethod::Get,
        ..CheckOptions::default()
    }
}

fn html_response(body: &str) -> ResponseTemplate {
    // set_body_string pins the mime to text/plain over any inserted
    // header; set_body_raw carries the real content type
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

async fn collect_until_end(rx: &mut UnboundedReceiver<CheckEvent>) -> Vec<CheckEvent> {
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(30), rx.recv()).await {
            Ok(Some(CheckEvent::End)) => break,
            Ok(Some(event)) => events.push(event),
            Ok(None) => break,
            Err(_) => panic!("timed out waiting for the checker to finish"),
        }
    }
    events
}

fn checked_links(events: &[CheckEvent]) -> Vec<&linkscour::Link> {
    events
        .iter()
        .filter_map(|event| match event {
            CheckEvent::Link { link, .. } => Some(link.as_ref()),
            _ => None,
        })
        .collect()
}

fn junked_links(events: &[CheckEvent]) -> Vec<&linkscour::Link> {
    events
        .iter()
        .filter_map(|event| match event {
            CheckEvent::Junk { link, .. } => Some(link.as_ref()),
            _ => None,
        })
        .collect()
}

fn page_urls(events: &[CheckEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            CheckEvent::Page { url, .. } => Some(url.to_string()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_page_with_working_and_broken_links() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<a href="/good">good</a><a href="/missing">missing</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (checker, mut rx) = HtmlUrlChecker::with_channel(test_options()).unwrap();
    checker.enqueue_page(Url::parse(&server.uri()).unwrap(), None);

    let events = collect_until_end(&mut rx).await;
    let links = checked_links(&events);
    assert_eq!(links.len(), 2);

    let good = links
        .iter()
        .find(|link| link.rebased_url.as_ref().unwrap().path() == "/good")
        .unwrap();
    assert_eq!(good.is_broken(), Some(false));

    let missing = links
        .iter()
        .find(|link| link.rebased_url.as_ref().unwrap().path() == "/missing")
        .unwrap();
    assert_eq!(missing.broken_reason().as_deref(), Some("HTTP_404"));

    // the page itself succeeded
    let page_error = events.iter().find_map(|event| match event {
        CheckEvent::Page { error, .. } => Some(error.clone()),
        _ => None,
    });
    assert_eq!(page_error, Some(None));
}

#[tokio::test]
async fn test_meta_nofollow_checks_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<meta name="robots" content="nofollow">
               <a href="/a">a</a><a href="/b">b</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (checker, mut rx) = HtmlUrlChecker::with_channel(test_options()).unwrap();
    checker.enqueue_page(Url::parse(&server.uri()).unwrap(), None);

    let events = collect_until_end(&mut rx).await;
    let junk = junked_links(&events);
    assert_eq!(junk.len(), 2);
    assert!(junk
        .iter()
        .all(|link| link.excluded_reason() == Some("BLC_ROBOTS")));
    assert!(checked_links(&events).is_empty());
}

#[tokio::test]
async fn test_x_robots_tag_header_nofollow() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            html_response(r#"<a href="/a">a</a>"#).insert_header("x-robots-tag", "nofollow"),
        )
        .mount(&server)
        .await;

    let (checker, mut rx) = HtmlUrlChecker::with_channel(test_options()).unwrap();
    checker.enqueue_page(Url::parse(&server.uri()).unwrap(), None);

    let events = collect_until_end(&mut rx).await;
    assert_eq!(junked_links(&events).len(), 1);
    assert!(checked_links(&events).is_empty());
}

#[tokio::test]
async fn test_duplicate_links_share_one_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<a href="/dup">first</a><a href="/dup">second</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dup"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (checker, mut rx) = HtmlUrlChecker::with_channel(test_options()).unwrap();
    checker.enqueue_page(Url::parse(&server.uri()).unwrap(), None);

    let events = collect_until_end(&mut rx).await;
    let links = checked_links(&events);
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|link| link.is_broken() == Some(false)));

    let mut cached: Vec<bool> = links
        .iter()
        .map(|link| link.response_was_cached.unwrap())
        .collect();
    cached.sort();
    assert_eq!(cached, vec![false, true]);
}

#[tokio::test]
async fn test_head_rejected_retries_with_get() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/picky"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/picky"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let options = CheckOptions {
        request_method: RequestMethod::Head,
        retry_405_head: true,
        ..CheckOptions::default()
    };
    let (checker, mut rx) = UrlChecker::with_channel(options).unwrap();
    let url = Url::parse(&format!("{}/picky", server.uri())).unwrap();
    checker.enqueue_url(url, None);

    match rx.recv().await.unwrap() {
        linkscour::checker::LinkEvent::Checked { link, .. } => {
            assert_eq!(link.is_broken(), Some(false));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_head_405_is_broken_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/picky"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;

    let options = CheckOptions {
        request_method: RequestMethod::Head,
        ..CheckOptions::default()
    };
    let (checker, mut rx) = UrlChecker::with_channel(options).unwrap();
    checker.enqueue_url(Url::parse(&format!("{}/picky", server.uri())).unwrap(), None);

    match rx.recv().await.unwrap() {
        linkscour::checker::LinkEvent::Checked { link, .. } => {
            assert_eq!(link.broken_reason().as_deref(), Some("HTTP_405"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_site_cycle_terminates() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_response(&format!(r#"<a href="{}/b">b</a>"#, base)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html_response(&format!(r#"<a href="{}/a">a</a>"#, base)))
        .mount(&server)
        .await;

    let (checker, mut rx) = SiteChecker::with_channel(test_options()).unwrap();
    checker.enqueue_site(Url::parse(&format!("{}/a", base)).unwrap(), None);

    let events = collect_until_end(&mut rx).await;

    let mut pages = page_urls(&events);
    pages.sort();
    assert_eq!(pages.len(), 2);
    assert!(pages[0].ends_with("/a"));
    assert!(pages[1].ends_with("/b"));

    let site_error = events.iter().find_map(|event| match event {
        CheckEvent::Site { error, .. } => Some(error.clone()),
        _ => None,
    });
    assert_eq!(site_error, Some(None));
}

#[tokio::test]
async fn test_redirected_page_crawled_once_under_final_url() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(r#"<a href="/b">b</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/c", base).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html_response("<p>landed</p>"))
        .mount(&server)
        .await;

    let (checker, mut rx) = SiteChecker::with_channel(test_options()).unwrap();
    checker.enqueue_site(Url::parse(&base).unwrap(), None);

    let events = collect_until_end(&mut rx).await;

    // the link to /b resolved through the redirect
    let link = checked_links(&events)
        .into_iter()
        .find(|link| link.rebased_url.as_ref().unwrap().path() == "/b")
        .unwrap();
    assert_eq!(link.is_broken(), Some(false));
    assert_eq!(link.redirected_url.as_ref().unwrap().path(), "/c");

    // /b is never crawled as a page, only its redirect target is
    let pages = page_urls(&events);
    assert_eq!(pages.len(), 2);
    assert!(pages.iter().any(|url| url.ends_with("/c")));
    assert!(!pages.iter().any(|url| url.ends_with("/b")));
}

#[tokio::test]
async fn test_broken_root_reports_page_and_site_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (checker, mut rx) = SiteChecker::with_channel(test_options()).unwrap();
    checker.enqueue_site(Url::parse(&format!("{}/gone", server.uri())).unwrap(), None);

    let events = collect_until_end(&mut rx).await;

    let page_error = events.iter().find_map(|event| match event {
        CheckEvent::Page { error, .. } => error.clone(),
        _ => None,
    });
    assert_eq!(page_error, Some(PageError::Http(404)));

    let site_error = events.iter().find_map(|event| match event {
        CheckEvent::Site { error, .. } => error.clone(),
        _ => None,
    });
    assert_eq!(site_error, Some(PageError::Http(404)));
}

#[tokio::test]
async fn test_iframe_target_crawled_despite_filter_level() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(r#"<iframe src="/framed"></iframe>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/framed"))
        .respond_with(html_response(r#"<a href="/inside">inside</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/inside"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // at level 0 the iframe link itself is junked, but iframes always
    // lead to documents, so their targets are crawled regardless
    let options = CheckOptions {
        filter_level: 0,
        ..test_options()
    };
    let (checker, mut rx) = SiteChecker::with_channel(options).unwrap();
    checker.enqueue_site(Url::parse(&server.uri()).unwrap(), None);

    let events = collect_until_end(&mut rx).await;

    let junk = junked_links(&events);
    assert_eq!(junk.len(), 1);
    assert_eq!(junk[0].excluded_reason(), Some("BLC_HTML"));

    // /framed is crawled; its anchor may pull in further pages, so the
    // total page count is not pinned
    let pages = page_urls(&events);
    assert!(pages.iter().any(|url| url.ends_with("/framed")));

    let inside = checked_links(&events)
        .into_iter()
        .find(|link| link.rebased_url.as_ref().unwrap().path() == "/inside")
        .unwrap();
    assert_eq!(inside.is_broken(), Some(false));
}

#[tokio::test]
async fn test_keyword_excluded_link_never_crawled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(r#"<a href="/secret/page">hidden</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secret/page"))
        .respond_with(html_response("<p>never fetched</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let options = CheckOptions {
        excluded_keywords: vec!["*secret*".into()],
        ..test_options()
    };
    let (checker, mut rx) = SiteChecker::with_channel(options).unwrap();
    checker.enqueue_site(Url::parse(&server.uri()).unwrap(), None);

    let events = collect_until_end(&mut rx).await;

    let junk = junked_links(&events);
    assert_eq!(junk.len(), 1);
    assert_eq!(junk[0].excluded_reason(), Some("BLC_KEYWORD"));
    assert_eq!(page_urls(&events).len(), 1);
}

#[tokio::test]
async fn test_offset_indices_partition_discovery_order() {
    // alternate kept anchors with level-filtered images so the two offset
    // counters advance interleaved
    let html = r#"
        <a href="/k0">k</a><img src="/x0">
        <a href="/k1">k</a><img src="/x1">
        <a href="/k2">k</a><img src="/x2">
    "#;
    let options = CheckOptions {
        filter_level: 0,
        // an unaccepted scheme keeps the checks offline
        accepted_schemes: vec!["nothing".into()],
        ..CheckOptions::default()
    };
    let (checker, mut rx) = HtmlChecker::with_channel(options).unwrap();
    checker
        .scan(
            html,
            Some(Url::parse("https://example.com/").unwrap()),
            None,
            None,
        )
        .await
        .unwrap();

    let mut kept = Vec::new();
    let mut excluded = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            CheckEvent::Link { link, .. } => {
                let html = link.html.unwrap();
                kept.push((html.index, html.offset_index.unwrap()));
            }
            CheckEvent::Junk { link, .. } => {
                let html = link.html.unwrap();
                excluded.push((html.index, html.offset_index.unwrap()));
            }
            _ => {}
        }
    }

    assert_eq!(kept.len() + excluded.len(), 6);

    // each partition's offsets form their own contiguous zero-based run
    let mut kept_offsets: Vec<usize> = kept.iter().map(|(_, offset)| *offset).collect();
    kept_offsets.sort();
    assert_eq!(kept_offsets, vec![0, 1, 2]);
    let mut excluded_offsets: Vec<usize> = excluded.iter().map(|(_, offset)| *offset).collect();
    excluded_offsets.sort();
    assert_eq!(excluded_offsets, vec![0, 1, 2]);

    // offsets follow discovery order within each partition
    kept.sort();
    assert!(kept.iter().enumerate().all(|(n, (_, offset))| *offset == n));
    excluded.sort();
    assert!(excluded
        .iter()
        .enumerate()
        .all(|(n, (_, offset))| *offset == n));

    // discovery indices cover both partitions
    let mut indices: Vec<usize> = kept
        .iter()
        .chain(excluded.iter())
        .map(|(index, _)| *index)
        .collect();
    indices.sort();
    assert_eq!(indices, (0..6).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_robots_txt_disallow_excludes_internal_links() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<a href="/private/x">secret</a><a href="/open">open</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/x"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (checker, mut rx) = SiteChecker::with_channel(test_options()).unwrap();
    checker.enqueue_site(Url::parse(&server.uri()).unwrap(), None);

    let events = collect_until_end(&mut rx).await;
    let junk = junked_links(&events);
    assert_eq!(junk.len(), 1);
    assert_eq!(junk[0].excluded_reason(), Some("BLC_ROBOTS"));
    assert_eq!(junk[0].rebased_url.as_ref().unwrap().path(), "/private/x");
}

#[tokio::test]
async fn test_content_type_must_be_html() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"{}".to_vec(), "application/json"))
        .mount(&server)
        .await;

    let (checker, mut rx) = HtmlUrlChecker::with_channel(test_options()).unwrap();
    checker.enqueue_page(
        Url::parse(&format!("{}/data.json", server.uri())).unwrap(),
        None,
    );

    let events = collect_until_end(&mut rx).await;
    let page_error = events.iter().find_map(|event| match event {
        CheckEvent::Page { error, .. } => error.clone(),
        _ => None,
    });
    assert!(matches!(page_error, Some(PageError::ContentType(Some(_)))));
}
