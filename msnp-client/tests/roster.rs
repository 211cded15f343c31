//! Contact- and group-management round trips.

mod common;

use common::{email, logged_in_client, CONTACT_GUID, GROUP_GUID};
use msnp_types::list::List;

#[tokio::test]
async fn rename_group_round_trip() {
    let (client, _connections, mut server) = logged_in_client().await;

    let guid = msnp_types::core::Guid::try_from(GROUP_GUID).unwrap();

    let rename = client.rename_group(&guid, "smama");
    let script = async {
        server.expect(&format!("REG 7 {GROUP_GUID} smama")).await;
        server
            .send(format!("REG 7 {GROUP_GUID} smama\r\n").as_bytes())
            .await;
    };

    let (result, ()) = tokio::join!(rename, script);
    result.unwrap();

    // The in-memory name follows the server's reply.
    let groups = client.groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "smama");
}

#[tokio::test]
async fn add_contact_stores_assigned_guid() {
    let (client, _connections, mut server) = logged_in_client().await;

    let new_email = email("new@x.y");
    let add = client.add_contact(&new_email, Some("New Guy"), None);
    let script = async {
        server.expect("ADC 7 FL N=new@x.y F=New%20Guy").await;
        server
            .send(
                b"ADC 7 FL N=new@x.y F=New%20Guy C=03fbbeca-128f-4a0d-b9a5-50b6b0c15e5f\r\n",
            )
            .await;
    };

    let (result, ()) = tokio::join!(add, script);
    let contact = result.unwrap();

    assert!(contact.is_on(List::Forward));
    assert_eq!(contact.nickname, "New Guy");
    assert_eq!(
        contact.guid.unwrap().as_str(),
        "03fbbeca-128f-4a0d-b9a5-50b6b0c15e5f"
    );
}

#[tokio::test]
async fn remove_contact_clears_roster_membership() {
    let (client, _connections, mut server) = logged_in_client().await;

    let c1_email = email("c1@x.y");
    let remove = client.remove_contact(&c1_email);
    let script = async {
        server.expect(&format!("REM 7 FL {CONTACT_GUID}")).await;
        server
            .send(format!("REM 7 FL {CONTACT_GUID}\r\n").as_bytes())
            .await;
    };

    let (result, ()) = tokio::join!(remove, script);
    result.unwrap();

    // Still known (other lists), but no longer on the roster.
    let contact = client.contact(&email("c1@x.y")).unwrap();
    assert!(!contact.is_on(List::Forward));
    assert!(contact.groups.is_empty());
}

#[tokio::test]
async fn block_is_exclusive_with_allow() {
    let (client, _connections, mut server) = logged_in_client().await;

    // r@x.y is on AL from the sync stream; blocking first leaves AL.
    let r_email = email("r@x.y");
    let block = client.block(&r_email);
    let script = async {
        server.expect("REM 7 AL r@x.y").await;
        server.send(b"REM 7 AL r@x.y\r\n").await;
        server.expect("ADC 8 BL N=r@x.y").await;
        server.send(b"ADC 8 BL N=r@x.y\r\n").await;
    };

    let (result, ()) = tokio::join!(block, script);
    result.unwrap();

    let contact = client.contact(&email("r@x.y")).unwrap();
    assert!(contact.is_blocked());
    assert!(!contact.is_on(List::Allow));

    // And back again.
    let unblock = client.unblock(&r_email);
    let script = async {
        server.expect("REM 9 BL r@x.y").await;
        server.send(b"REM 9 BL r@x.y\r\n").await;
        server.expect("ADC 10 AL N=r@x.y").await;
        server.send(b"ADC 10 AL N=r@x.y\r\n").await;
    };

    let (result, ()) = tokio::join!(unblock, script);
    result.unwrap();

    let contact = client.contact(&email("r@x.y")).unwrap();
    assert!(!contact.is_blocked());
    assert!(contact.is_on(List::Allow));
}

#[tokio::test]
async fn presence_updates_flow_into_contacts() {
    let (client, _connections, mut server) = logged_in_client().await;
    let mut events = client.events().unwrap();

    server.send(b"NLN AWY c1@x.y C1%20Renamed 268435456\r\n").await;

    loop {
        match events.recv().await.unwrap() {
            msnp_client::ClientEvent::ContactPresenceChanged { login, status } => {
                assert_eq!(login.as_str(), "c1@x.y");
                assert_eq!(status, Some(msnp_types::presence::Status::Away));
                break;
            }
            _ => continue,
        }
    }

    let contact = client.contact(&email("c1@x.y")).unwrap();
    assert_eq!(contact.status, Some(msnp_types::presence::Status::Away));
    assert_eq!(contact.nickname, "C1 Renamed");

    server.send(b"FLN c1@x.y\r\n").await;
    loop {
        match events.recv().await.unwrap() {
            msnp_client::ClientEvent::ContactPresenceChanged { status: None, .. } => break,
            _ => continue,
        }
    }
    assert_eq!(client.contact(&email("c1@x.y")).unwrap().status, None);
}

#[tokio::test]
async fn personal_message_updates_from_ubx() {
    let (client, _connections, mut server) = logged_in_client().await;
    let mut events = client.events().unwrap();

    let payload = b"<Data><PSM>out to lunch</PSM><CurrentMedia></CurrentMedia></Data>";
    server
        .send(format!("UBX c1@x.y {}\r\n", payload.len()).as_bytes())
        .await;
    server.send(payload).await;

    loop {
        match events.recv().await.unwrap() {
            msnp_client::ClientEvent::ContactPersonalMessageChanged {
                login,
                personal_message,
            } => {
                assert_eq!(login.as_str(), "c1@x.y");
                assert_eq!(personal_message, "out to lunch");
                break;
            }
            _ => continue,
        }
    }
}
