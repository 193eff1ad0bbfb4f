mod common;

use cell_broker::dtos::auth::GrantRequest;
use cell_broker::models::{Cell, ExtCellRef, ExtRoleRef, RelationRef, RoleRef};
use cell_broker::services::token::TokenKind;
use cell_broker::BrokerError;

use common::{broker, no_lockout, TestBroker, CELL1, CELL2};

const CELL3: &str = "https://unit.example/testcell3/";

/// testcell2 registers testcell1 as an ext-cell, linked through the
/// `partner` relation to the local `r2` role.
fn register_partner_edge(broker: &TestBroker) {
    broker.directory.add_ext_cell(
        CELL2,
        ExtCellRef {
            id: "ec1".to_string(),
            url: CELL1.to_string(),
        },
    );
    broker.directory.link_ext_cell_relation(
        CELL2,
        "ec1",
        RelationRef {
            id: "rel1".to_string(),
            name: "partner".to_string(),
        },
    );
    broker
        .directory
        .link_relation_role(CELL2, "rel1", RoleRef::unscoped("r2"));
}

async fn trans_cell_token_for_cell2(broker: &TestBroker) -> String {
    let request = GrantRequest::password_grant("account1", "password1").with_target(CELL2);
    broker
        .issuer
        .grant(CELL1, &request, None)
        .await
        .unwrap()
        .access_token
}

#[tokio::test]
async fn assertion_grant_resolves_federated_roles() {
    let broker = broker(no_lockout());
    register_partner_edge(&broker);

    let assertion = trans_cell_token_for_cell2(&broker).await;
    let response = broker
        .issuer
        .grant(CELL2, &GrantRequest::assertion_grant(&assertion), None)
        .await
        .unwrap();

    let claims = broker.codec.parse(&response.access_token, CELL2).unwrap();
    assert_eq!(claims.knd, TokenKind::VisitorLocalAccess);
    assert_eq!(claims.iss, CELL2);
    assert_eq!(claims.sub, format!("{CELL1}#account1"));
    assert_eq!(claims.roles, vec![format!("{CELL2}__role/__/r2")]);
}

#[tokio::test]
async fn missing_ext_cell_yields_an_empty_role_set_not_an_error() {
    let broker = broker(no_lockout());

    let assertion = trans_cell_token_for_cell2(&broker).await;
    let response = broker
        .issuer
        .grant(CELL2, &GrantRequest::assertion_grant(&assertion), None)
        .await
        .unwrap();

    let claims = broker.codec.parse(&response.access_token, CELL2).unwrap();
    assert_eq!(claims.knd, TokenKind::VisitorLocalAccess);
    assert!(claims.roles.is_empty());
}

#[tokio::test]
async fn visitor_refresh_re_resolves_against_the_current_graph() {
    let broker = broker(no_lockout());
    register_partner_edge(&broker);

    let assertion = trans_cell_token_for_cell2(&broker).await;
    let set = broker
        .issuer
        .grant(CELL2, &GrantRequest::assertion_grant(&assertion), None)
        .await
        .unwrap();

    // Trust is withdrawn between issuance and refresh.
    broker.directory.remove_ext_cell(CELL2, "ec1");

    let refreshed = broker
        .issuer
        .grant(
            CELL2,
            &GrantRequest::refresh_grant(set.refresh_token.as_deref().unwrap()),
            None,
        )
        .await
        .unwrap();
    let claims = broker.codec.parse(&refreshed.access_token, CELL2).unwrap();
    assert_eq!(claims.knd, TokenKind::VisitorLocalAccess);
    assert!(claims.roles.is_empty());
}

#[tokio::test]
async fn chained_federation_re_resolves_at_every_hop() {
    let broker = broker(no_lockout());
    register_partner_edge(&broker);
    broker.directory.add_cell(Cell::new(CELL3, "testcell3"));

    // testcell3 trusts testcell2 and aliases its r2 role to c-role.
    broker.directory.add_ext_cell(
        CELL3,
        ExtCellRef {
            id: "ec2".to_string(),
            url: CELL2.to_string(),
        },
    );
    broker.directory.link_ext_cell_relation(
        CELL3,
        "ec2",
        RelationRef {
            id: "rel2".to_string(),
            name: "bc".to_string(),
        },
    );
    broker.directory.link_relation_ext_role(
        CELL3,
        ExtRoleRef {
            id: "er1".to_string(),
            role_url: format!("{CELL2}__role/__/r2"),
            relation_id: "rel2".to_string(),
        },
    );
    broker
        .directory
        .link_ext_role_role(CELL3, "er1", RoleRef::unscoped("c-role"));

    // Hop 1: account1's token travels to testcell2, which re-mints
    // toward testcell3 with the roles resolved locally.
    let assertion = trans_cell_token_for_cell2(&broker).await;
    let hop = broker
        .issuer
        .grant(
            CELL2,
            &GrantRequest::assertion_grant(&assertion).with_target(CELL3),
            None,
        )
        .await
        .unwrap();
    let minted = broker.codec.parse(&hop.access_token, CELL3).unwrap();
    assert_eq!(minted.knd, TokenKind::TransCellAccess);
    assert_eq!(minted.iss, CELL2);
    assert_eq!(minted.roles, vec![format!("{CELL2}__role/__/r2")]);

    // Hop 2: testcell3 grants exactly what its alias for testcell2's
    // r2 allows, not anything account1 held at home.
    let response = broker
        .issuer
        .grant(CELL3, &GrantRequest::assertion_grant(&hop.access_token), None)
        .await
        .unwrap();
    let claims = broker.codec.parse(&response.access_token, CELL3).unwrap();
    assert_eq!(claims.roles, vec![format!("{CELL3}__role/__/c-role")]);
}

#[tokio::test]
async fn assertion_must_be_a_trans_cell_access_token() {
    let broker = broker(no_lockout());
    let set = broker
        .issuer
        .grant(
            CELL1,
            &GrantRequest::password_grant("account1", "password1"),
            None,
        )
        .await
        .unwrap();

    // A resident local token is not acceptable as an assertion.
    let err = broker
        .issuer
        .grant(
            CELL1,
            &GrantRequest::assertion_grant(&set.access_token),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::TokenParse));
}

#[tokio::test]
async fn assertion_with_p_owner_is_refused() {
    let broker = broker(no_lockout());
    register_partner_edge(&broker);

    let assertion = trans_cell_token_for_cell2(&broker).await;
    let mut request = GrantRequest::assertion_grant(&assertion);
    request.p_owner = Some("true".to_string());
    let err = broker.issuer.grant(CELL2, &request, None).await.unwrap_err();
    assert!(matches!(err, BrokerError::TcAccessRepresentingOwner));
}
