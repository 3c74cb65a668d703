//! Integration tests for `/admin/{id}/map`

mod common;

use axum::http::StatusCode;
use clover_core::{MappingStore, Urn};
use common::*;

struct Setup {
    gateway: Gateway,
    nigeria: String,
    lagos: String,
    abuja: String,
    nairobi: String,
}

async fn setup() -> Setup {
    let gateway = Gateway::start().await;
    let (nigeria, lagos, abuja) = (new_id(), new_id(), new_id());
    let (kenya, nairobi) = (new_id(), new_id());

    let response = gateway
        .submit_config(&[
            interchange(
                &nigeria,
                "Nigeria",
                vec![
                    channel(&lagos, "lagos", "https://lagos.example.com", &[]),
                    channel(&abuja, "abuja", "https://abuja.example.com", &[]),
                ],
            ),
            interchange(
                &kenya,
                "Kenya",
                vec![channel(&nairobi, "nairobi", "https://nairobi.example.com", &[])],
            ),
        ])
        .await;
    assert_status(&response, StatusCode::OK);

    Setup {
        gateway,
        nigeria,
        lagos,
        abuja,
        nairobi,
    }
}

fn map_uri(interchange: &str, query: &str) -> String {
    format!("/admin/{}/map?{}", interchange, query)
}

async fn current(setup: &Setup, urn: &str) -> Option<String> {
    let interchange = setup
        .gateway
        .engine
        .interchange(setup.nigeria.parse().unwrap())
        .await
        .unwrap();
    setup
        .gateway
        .store
        .get_mapping(&interchange, &Urn::from_raw(urn))
        .await
        .unwrap()
        .map(|c| c.id.to_string())
}

#[tokio::test]
async fn test_set_overwrite_and_clear() {
    let setup = setup().await;

    let response = setup
        .gateway
        .send(admin_request(
            "POST",
            &map_uri(&setup.nigeria, &format!("urn=tel%3A555&channel={}", setup.lagos)),
            None,
        ))
        .await;
    assert_status(&response, StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "mapping created");
    assert_eq!(current(&setup, "tel:555").await, Some(setup.lagos.clone()));

    // last write wins
    setup
        .gateway
        .send(admin_request(
            "POST",
            &map_uri(&setup.nigeria, &format!("urn=tel%3A555&channel={}", setup.abuja)),
            None,
        ))
        .await;
    assert_eq!(current(&setup, "tel:555").await, Some(setup.abuja.clone()));

    let response = setup
        .gateway
        .send(admin_request(
            "DELETE",
            &map_uri(&setup.nigeria, "urn=tel%3A555"),
            None,
        ))
        .await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "mapping removed");
    assert_eq!(current(&setup, "tel:555").await, None);

    // clearing again is not an error
    let response = setup
        .gateway
        .send(admin_request(
            "DELETE",
            &map_uri(&setup.nigeria, "urn=tel%3A555"),
            None,
        ))
        .await;
    assert_status(&response, StatusCode::OK);
}

#[tokio::test]
async fn test_form_body_fields_are_accepted() {
    let setup = setup().await;

    let form = format!("urn=tel%3A777&channel={}", setup.abuja);
    let response = setup
        .gateway
        .send(admin_request(
            "POST",
            &format!("/admin/{}/map", setup.nigeria),
            Some(form),
        ))
        .await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(current(&setup, "tel:777").await, Some(setup.abuja.clone()));
}

#[tokio::test]
async fn test_channel_of_other_interchange_is_rejected() {
    let setup = setup().await;

    let response = setup
        .gateway
        .send(admin_request(
            "POST",
            &map_uri(
                &setup.nigeria,
                &format!("urn=tel%3A555&channel={}", setup.nairobi),
            ),
            None,
        ))
        .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "channel does not belong to interchange");
    assert_eq!(current(&setup, "tel:555").await, None);
}

#[tokio::test]
async fn test_missing_urn_and_unknown_interchange() {
    let setup = setup().await;

    let response = setup
        .gateway
        .send(admin_request(
            "POST",
            &map_uri(&setup.nigeria, &format!("channel={}", setup.lagos)),
            None,
        ))
        .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "missing urn");

    let response = setup
        .gateway
        .send(admin_request(
            "DELETE",
            &map_uri(&setup.nigeria, ""),
            None,
        ))
        .await;
    assert_status(&response, StatusCode::BAD_REQUEST);

    let response = setup
        .gateway
        .send(admin_request(
            "POST",
            &map_uri(&new_id(), &format!("urn=tel%3A555&channel={}", setup.lagos)),
            None,
        ))
        .await;
    assert_status(&response, StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "interchange not found");
}

#[tokio::test]
async fn test_admin_mapping_is_used_for_routing() {
    let setup = setup().await;

    setup
        .gateway
        .send(admin_request(
            "POST",
            &map_uri(&setup.nigeria, &format!("urn=tel%3A555&channel={}", setup.abuja)),
            None,
        ))
        .await;

    let interchange = setup
        .gateway
        .engine
        .interchange(setup.nigeria.parse().unwrap())
        .await
        .unwrap();
    let decision = setup
        .gateway
        .engine
        .decide(&interchange, "555", "hello")
        .await
        .unwrap();
    assert_eq!(decision.channel.id.to_string(), setup.abuja);
    assert_eq!(decision.reason.to_string(), "urn mapping");
}
