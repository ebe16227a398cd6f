//! Router harness shared by the handler tests

use super::{build_router, AppState};
use crate::pool::{ensure_schema, seed_default_users, Store};
use crate::registry::SchemaRegistry;
use crate::security::{Claims, Role, TokenCodec};
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::Algorithm;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const FIXTURES: &str = r#"
INSERT INTO circuits (id, circuit_ref, name, location, country, lat, lng, alt, url) VALUES
    (1, 'monza', 'Autodromo Nazionale di Monza', 'Monza', 'Italy', 45.6156, 9.28111, 162, 'http://en.wikipedia.org/wiki/Autodromo_Nazionale_Monza'),
    (2, 'silverstone', 'Silverstone Circuit', 'Silverstone', 'UK', 52.0786, -1.01694, 153, 'http://en.wikipedia.org/wiki/Silverstone_Circuit');

INSERT INTO constructors (id, constructor_ref, name, nationality, url) VALUES
    (1, 'mercedes', 'Mercedes', 'German', 'http://en.wikipedia.org/wiki/Mercedes-Benz_in_Formula_One'),
    (2, 'ferrari', 'Ferrari', 'Italian', 'http://en.wikipedia.org/wiki/Scuderia_Ferrari');

INSERT INTO status (id, status) VALUES (1, 'Finished'), (11, '+1 Lap');

INSERT INTO drivers (id, driver_ref, number, code, forename, surname, dob, nationality, url) VALUES
    (1, 'hamilton', '44', 'HAM', 'Lewis', 'Hamilton', '1985-01-07', 'British', 'http://en.wikipedia.org/wiki/Lewis_Hamilton'),
    (2, 'leclerc', '16', 'LEC', 'Charles', 'Leclerc', '1997-10-16', 'Monegasque', 'http://en.wikipedia.org/wiki/Charles_Leclerc'),
    (3, 'russell', '63', 'RUS', 'George', 'Russell', '1998-02-15', 'British', 'http://en.wikipedia.org/wiki/George_Russell_(racing_driver)'),
    (4, 'fangio', NULL, NULL, 'Juan', 'Fangio', '1911-06-24', 'Argentine', 'http://en.wikipedia.org/wiki/Juan_Manuel_Fangio'),
    (5, 'ascari', NULL, NULL, 'Alberto', 'Ascari', '1918-07-13', 'Italian', 'http://en.wikipedia.org/wiki/Alberto_Ascari');

INSERT INTO races (id, year, round, circuit_id, name, date, time, url) VALUES
    (1, 2019, 14, 1, 'Italian Grand Prix', '2019-09-08', '13:10:00', 'http://en.wikipedia.org/wiki/2019_Italian_Grand_Prix'),
    (2, 2020, 4, 2, 'British Grand Prix', '2020-08-02', '13:10:00', 'http://en.wikipedia.org/wiki/2020_British_Grand_Prix'),
    (3, 2021, 10, 2, 'British Grand Prix', '2021-07-18', '14:00:00', 'http://en.wikipedia.org/wiki/2021_British_Grand_Prix');

INSERT INTO results (id, race_id, driver_id, constructor_id, number, grid, position, position_text, position_order, points, laps, time, milliseconds, fastest_lap, rank, fastest_lap_time, fastest_lap_speed, status_id) VALUES
    (1, 1, 2, 2, 16, 1, 1, '1', 1, 25, 53, '1:15:26.665', 4526665, 51, 2, '1:22.334', '253.326', 1),
    (2, 1, 1, 1, 44, 3, 3, '3', 3, 15, 53, '+35.199', 4561864, 52, 3, '1:22.497', '252.826', 1),
    (3, 2, 1, 1, 44, 1, 1, '1', 1, 25, 52, '1:28:01.283', 5281283, 44, 1, '1:27.097', '243.256', 1),
    (4, 2, 2, 2, 16, 4, 3, '3', 3, 15, 52, '+18.474', 5299757, 45, 5, '1:28.000', '240.100', 1),
    (5, 3, 1, 1, 44, 2, 1, '1', 1, 25, 52, '1:58:23.284', 7103284, 48, 2, '1:29.699', '236.423', 1),
    (6, 3, 3, 1, 63, 12, NULL, 'R', 14, 0, 30, NULL, NULL, 28, 11, '1:31.200', '232.000', 11);
"#;

pub const SECRET: &str = "router-test-secret";

pub struct TestApp {
    pub state: AppState,
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    /// Fresh store with the bootstrap schema, default accounts and a small season of data
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("f1.db"), 2).unwrap();
        store
            .interact(|conn| {
                ensure_schema(conn)?;
                seed_default_users(conn)?;
                conn.execute_batch(FIXTURES)?;
                Ok(())
            })
            .await
            .unwrap();

        let state = AppState::new(
            store,
            SchemaRegistry::builtin().unwrap(),
            TokenCodec::new(SECRET, Algorithm::HS256, 24),
        );
        let router = build_router(state.clone());

        Self {
            state,
            router,
            _dir: dir,
        }
    }

    /// Valid token for a seeded or created account
    pub async fn token_for(&self, username: &str) -> String {
        let account = self.state.store.find_account(username).await.unwrap().unwrap();
        let role: Role = account.role.parse().unwrap();
        self.state.tokens.issue(account.id, &account.username, role).unwrap()
    }

    /// Token for `username` whose expiry is two hours in the past
    pub async fn expired_token_for(&self, username: &str) -> String {
        let account = self.state.store.find_account(username).await.unwrap().unwrap();
        let role: Role = account.role.parse().unwrap();
        let mut claims: Claims = self.state.tokens.claims_for(account.id, &account.username, role);
        claims.iat -= 3 * 3600;
        claims.exp = claims.iat + 3600;
        self.state.tokens.encode(&claims).unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, headers, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Value) {
        self.send(Method::GET, uri, None, None).await
    }

    /// Single value from the store, for checking side effects
    pub async fn scalar(&self, sql: &'static str) -> i64 {
        self.state
            .store
            .interact(move |conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
            .await
            .unwrap()
    }

    pub async fn execute(&self, sql: &'static str) {
        self.state
            .store
            .interact(move |conn| Ok(conn.execute(sql, [])?))
            .await
            .unwrap();
    }
}
