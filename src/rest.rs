//! Judge REST api: routing and the thin glue between HTTP and the core.

use anyhow::Context as _;
use arbiter_apis::{
    CreateProblemRequest, CreateTestcaseRequest, CreatedProblem, LoginRequest, MessageResponse,
    ProfileResponse, SolutionsResponse, SubmitRequest, TokenResponse,
};
use processor::Evaluator;
use serde::Deserialize;
use serde::Serialize;
use std::convert::Infallible;
use store::{Store, StoreError};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection};

use crate::auth::{self, AuthContext};
use crate::reject;

/// Frontend development origin allowed through CORS.
const CORS_ORIGIN: &str = "http://localhost:5173";

const DIFFICULTIES: [&str; 3] = ["easy", "medium", "hard"];

#[derive(Clone)]
pub struct App {
    pub store: Store,
    pub evaluator: Evaluator,
    pub secret_key: String,
}

#[derive(Deserialize)]
struct SolutionsQuery {
    #[serde(default)]
    problem_uuid: String,
}

fn with_app(app: App) -> impl Filter<Extract = (App,), Error = Infallible> + Clone {
    warp::any().map(move || app.clone())
}

/// Resolves the bearer token into an [`AuthContext`], rejecting with 401
/// when it is missing, malformed, revoked or expired.
fn authenticated(app: &App) -> impl Filter<Extract = (AuthContext,), Error = Rejection> + Clone {
    let app = app.clone();
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let app = app.clone();
        async move {
            auth::authorize(&app.store, &app.secret_key, header)
                .await
                .map_err(reject::from_auth)
        }
    })
}

/// Like [`authenticated`], but additionally requires the `admin` role.
fn admin(app: &App) -> impl Filter<Extract = (AuthContext,), Error = Rejection> + Clone {
    authenticated(app).and_then(|ctx: AuthContext| async move {
        if ctx.is_admin() {
            Ok(ctx)
        } else {
            Err(reject::api_error(
                StatusCode::FORBIDDEN,
                "insufficient privileges",
            ))
        }
    })
}

fn ok_json<T: Serialize>(body: &T) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(body), StatusCode::OK)
}

fn parse_uuid(raw: &str) -> Result<(), Rejection> {
    Uuid::parse_str(raw)
        .map(|_| ())
        .map_err(|_| reject::api_error(StatusCode::BAD_REQUEST, "invalid problem UUID"))
}

async fn login(app: App, req: LoginRequest) -> Result<WithStatus<Json>, Rejection> {
    let (user_id, role) = app
        .store
        .verify_credentials(&req.username, &req.password)
        .await
        .map_err(reject::from_store)?;
    let token = auth::issue_token(&app.secret_key, &user_id, &req.username, &role).map_err(
        |err| {
            tracing::error!(error = %err, "token signing failed");
            reject::api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        },
    )?;
    app.store
        .upsert_session(&req.username, &token)
        .await
        .map_err(reject::from_store)?;
    tracing::info!(username = %req.username, "user logged in");
    Ok(ok_json(&TokenResponse { token }))
}

async fn signup(app: App, req: LoginRequest) -> Result<WithStatus<Json>, Rejection> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(reject::api_error(
            StatusCode::BAD_REQUEST,
            "username and password are required",
        ));
    }
    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST).map_err(|err| {
        tracing::error!(error = %err, "password hashing failed");
        reject::api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    })?;
    let user_id = Uuid::new_v4().to_string();
    app.store
        .add_user(&user_id, &req.username, &password_hash, "user")
        .await
        .map_err(reject::from_store)?;
    tracing::info!(username = %req.username, "user registered");
    Ok(ok_json(&MessageResponse {
        message: "user registered successfully".to_string(),
    }))
}

async fn profile(app: App, ctx: AuthContext) -> Result<WithStatus<Json>, Rejection> {
    let (current_streak, longest_streak) = app
        .store
        .user_streaks(&ctx.user_id)
        .await
        .map_err(reject::from_store)?;
    let success_rate = app
        .store
        .success_rate(&ctx.user_id)
        .await
        .map_err(reject::from_store)?;
    let solved = app
        .store
        .user_solutions(&ctx.user_id, "")
        .await
        .map_err(reject::from_store)?;
    Ok(ok_json(&ProfileResponse {
        user_id: ctx.user_id,
        username: ctx.username,
        role: ctx.role,
        current_streak,
        longest_streak,
        success_rate,
        solved,
    }))
}

async fn list_problems(app: App, ctx: AuthContext) -> Result<WithStatus<Json>, Rejection> {
    let problems = app
        .store
        .get_all_problems(&ctx.user_id)
        .await
        .map_err(reject::from_store)?;
    Ok(ok_json(&problems))
}

async fn get_problem(
    uuid: String,
    app: App,
    ctx: AuthContext,
) -> Result<WithStatus<Json>, Rejection> {
    parse_uuid(&uuid)?;
    let mut problem = app
        .store
        .get_problem(&uuid, &ctx.user_id)
        .await
        .map_err(reject::from_store)?;
    if problem.solved {
        problem.solution = app
            .store
            .latest_accepted_attempt(&ctx.user_id, &problem.uuid)
            .await
            .map_err(reject::from_store)?;
    }
    Ok(ok_json(&problem))
}

async fn submit(
    uuid: String,
    app: App,
    ctx: AuthContext,
    req: SubmitRequest,
) -> Result<WithStatus<Json>, Rejection> {
    parse_uuid(&uuid)?;
    let result = app
        .evaluator
        .evaluate(&uuid, &req, &ctx.user_id)
        .await
        .map_err(reject::from_evaluate)?;
    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok(warp::reply::with_status(warp::reply::json(&result), status))
}

async fn solutions(
    app: App,
    ctx: AuthContext,
    query: SolutionsQuery,
) -> Result<WithStatus<Json>, Rejection> {
    let solutions = app
        .store
        .user_solutions(&ctx.user_id, &query.problem_uuid)
        .await
        .map_err(reject::from_store)?;
    Ok(ok_json(&SolutionsResponse { solutions }))
}

async fn create_problem(
    app: App,
    _ctx: AuthContext,
    req: CreateProblemRequest,
) -> Result<WithStatus<Json>, Rejection> {
    if req.name.is_empty() {
        return Err(reject::api_error(
            StatusCode::BAD_REQUEST,
            "problem name is required",
        ));
    }
    if !DIFFICULTIES.contains(&req.difficulty.as_str()) {
        return Err(reject::api_error(
            StatusCode::BAD_REQUEST,
            "difficulty must be one of easy, medium, hard",
        ));
    }
    let uuid = Uuid::new_v4().to_string();
    app.store
        .add_problem(&uuid, &req.name, &req.difficulty, &req.description)
        .await
        .map_err(reject::from_store)?;
    Ok(ok_json(&CreatedProblem { uuid }))
}

async fn add_testcase(
    uuid: String,
    app: App,
    ctx: AuthContext,
    req: CreateTestcaseRequest,
) -> Result<WithStatus<Json>, Rejection> {
    parse_uuid(&uuid)?;
    let problem = app
        .store
        .get_problem(&uuid, &ctx.user_id)
        .await
        .map_err(reject::from_store)?;
    app.store
        .add_testcase(&problem.uuid, &req.input, &req.output)
        .await
        .map_err(reject::from_store)?;
    Ok(ok_json(&MessageResponse {
        message: "test case added successfully".to_string(),
    }))
}

async fn list_testcases(
    uuid: String,
    app: App,
    ctx: AuthContext,
) -> Result<WithStatus<Json>, Rejection> {
    parse_uuid(&uuid)?;
    let problem = app
        .store
        .get_problem(&uuid, &ctx.user_id)
        .await
        .map_err(reject::from_store)?;
    let cases = match app.store.get_test_cases(&problem.uuid).await {
        Ok(cases) => cases,
        Err(StoreError::TestCasesNotFound) => Vec::new(),
        Err(err) => return Err(reject::from_store(err)),
    };
    Ok(ok_json(&cases))
}

async fn delete_testcase(
    id: i32,
    app: App,
    _ctx: AuthContext,
) -> Result<WithStatus<Json>, Rejection> {
    app.store
        .delete_testcase(id)
        .await
        .map_err(reject::from_store)?;
    Ok(ok_json(&MessageResponse {
        message: "test case deleted successfully".to_string(),
    }))
}

async fn delete_problem(
    uuid: String,
    app: App,
    _ctx: AuthContext,
) -> Result<WithStatus<Json>, Rejection> {
    parse_uuid(&uuid)?;
    app.store
        .delete_problem(&uuid)
        .await
        .map_err(reject::from_store)?;
    Ok(ok_json(&MessageResponse {
        message: "problem and all its test cases deleted successfully".to_string(),
    }))
}

/// Serves the api.
pub async fn serve(port: u16, app: App) -> anyhow::Result<()> {
    let route_login = warp::post()
        .and(warp::path!("api" / "auth" / "login"))
        .and(with_app(app.clone()))
        .and(warp::body::json())
        .and_then(login)
        .boxed();

    let route_signup = warp::post()
        .and(warp::path!("api" / "auth" / "signup"))
        .and(with_app(app.clone()))
        .and(warp::body::json())
        .and_then(signup)
        .boxed();

    let route_profile = warp::get()
        .and(warp::path!("api" / "profile"))
        .and(with_app(app.clone()))
        .and(authenticated(&app))
        .and_then(profile)
        .boxed();

    let route_problems = warp::get()
        .and(warp::path!("api" / "problems"))
        .and(with_app(app.clone()))
        .and(authenticated(&app))
        .and_then(list_problems)
        .boxed();

    let route_get_problem = warp::get()
        .and(warp::path!("api" / "problem" / String))
        .and(with_app(app.clone()))
        .and(authenticated(&app))
        .and_then(get_problem)
        .boxed();

    let route_submit = warp::post()
        .and(warp::path!("api" / "problem" / String))
        .and(with_app(app.clone()))
        .and(authenticated(&app))
        .and(warp::body::json())
        .and_then(submit)
        .boxed();

    let route_solutions = warp::get()
        .and(warp::path!("api" / "solutions"))
        .and(with_app(app.clone()))
        .and(authenticated(&app))
        .and(warp::query::<SolutionsQuery>())
        .and_then(solutions)
        .boxed();

    let route_create_problem = warp::post()
        .and(warp::path!("api" / "admin" / "problem"))
        .and(with_app(app.clone()))
        .and(admin(&app))
        .and(warp::body::json())
        .and_then(create_problem)
        .boxed();

    let route_add_testcase = warp::post()
        .and(warp::path!("api" / "admin" / "problem" / String / "testcase"))
        .and(with_app(app.clone()))
        .and(admin(&app))
        .and(warp::body::json())
        .and_then(add_testcase)
        .boxed();

    let route_list_testcases = warp::get()
        .and(warp::path!("api" / "admin" / "problem" / String / "testcases"))
        .and(with_app(app.clone()))
        .and(admin(&app))
        .and_then(list_testcases)
        .boxed();

    let route_delete_testcase = warp::delete()
        .and(warp::path!("api" / "admin" / "testcase" / i32))
        .and(with_app(app.clone()))
        .and(admin(&app))
        .and_then(delete_testcase)
        .boxed();

    let route_delete_problem = warp::delete()
        .and(warp::path!("api" / "admin" / "problem" / String))
        .and(with_app(app.clone()))
        .and(admin(&app))
        .and_then(delete_problem)
        .boxed();

    let cors = warp::cors()
        .allow_origin(CORS_ORIGIN)
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_headers(vec!["origin", "content-type", "authorization"])
        .allow_credentials(true)
        .max_age(12 * 60 * 60);

    let routes = route_login
        .or(route_signup)
        .or(route_profile)
        .or(route_problems)
        .or(route_get_problem)
        .or(route_submit)
        .or(route_solutions)
        .or(route_create_problem)
        .or(route_add_testcase)
        .or(route_list_testcases)
        .or(route_delete_testcase)
        .or(route_delete_problem)
        .with(cors)
        .recover(reject::recover);

    let server = warp::serve(routes.with(warp::filters::trace::request()));
    let srv = server
        .try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), futures::future::pending())
        .context("failed to bind")?
        .1;
    srv.await;
    Ok(())
}
