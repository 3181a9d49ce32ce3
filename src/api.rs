use crate::query::QueryService;
use chrono::Utc;
use log::info;
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

/// HTTP surface over the query service.
///
/// - `GET /api/routes` lists route summaries
/// - `GET /api/routes/{id}` returns one route
/// - `GET /api/routes/{id}/shape` returns `[lat, lon]` pairs
/// - `GET /api/test` reports whether the feed loaded, plus load counters
pub fn routes(
    service: QueryService,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let service_filter = warp::any().map(move || service.clone()).boxed();

    // GET /
    let root_route = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "message": "Hello World from Backend!" })));

    // GET /api/hello
    let hello_route = warp::path!("api" / "hello")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "message": "Hello World API!" })));

    // GET /api/test
    let test_route = warp::path!("api" / "test")
        .and(warp::get())
        .and(service_filter.clone())
        .map(|service: QueryService| {
            warp::reply::json(&json!({
                "message": "Backend is working!",
                "timestamp": Utc::now().to_rfc3339(),
                "gtfsLoaded": service.is_loaded(),
                "stats": service.stats(),
            }))
        });

    // GET /api/routes
    let list_route = warp::path!("api" / "routes")
        .and(warp::get())
        .and(service_filter.clone())
        .map(list_routes);

    // GET /api/routes/{id}
    let route_route = warp::path!("api" / "routes" / String)
        .and(warp::get())
        .and(service_filter.clone())
        .map(get_route);

    // GET /api/routes/{id}/shape
    let shape_route = warp::path!("api" / "routes" / String / "shape")
        .and(warp::get())
        .and(service_filter)
        .map(get_route_shape);

    root_route
        .or(hello_route)
        .or(test_route)
        .or(list_route)
        .or(route_route)
        .or(shape_route)
        .with(warp::cors().allow_any_origin().allow_methods(vec!["GET"]))
        .with(warp::log("subway_shapes::api"))
}

fn json_with_status(body: serde_json::Value, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn list_routes(service: QueryService) -> Response {
    if !service.is_loaded() {
        return json_with_status(
            json!({
                "error": "GTFS data not loaded",
                "message": "The GTFS parser failed to load data on startup",
            }),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
    }

    let routes = service.list_routes_summary();
    info!("Sending {} routes", routes.len());
    warp::reply::json(&routes).into_response()
}

// Path segments arrive percent-encoded; ids are matched decoded.
fn decode_route_id(raw: &str) -> Result<String, Response> {
    urlencoding::decode(raw)
        .map(|id| id.into_owned())
        .map_err(|_| {
            json_with_status(
                json!({ "error": "Invalid route id", "routeId": raw }),
                StatusCode::BAD_REQUEST,
            )
        })
}

fn get_route(raw_id: String, service: QueryService) -> Response {
    let route_id = match decode_route_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.get_route(&route_id) {
        Ok(route) => warp::reply::json(route).into_response(),
        Err(e) => json_with_status(
            json!({ "error": "Route not found", "routeId": e.route_id() }),
            StatusCode::NOT_FOUND,
        ),
    }
}

fn get_route_shape(raw_id: String, service: QueryService) -> Response {
    let route_id = match decode_route_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.get_route_shape(&route_id) {
        Ok(shape) if !shape.is_empty() => warp::reply::json(&shape).into_response(),
        _ => json_with_status(
            json!({ "error": "Route shape not found", "routeId": route_id }),
            StatusCode::NOT_FOUND,
        ),
    }
}
