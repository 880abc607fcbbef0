// Portfolio advice

use axum::extract::State;
use std::sync::Arc;
use tracing::info;

use crate::auth::AuthUser;
use crate::database::AdviceRepo;
use crate::error::ApiResult;
use crate::models::{Advice, AdviceRequest};
use crate::response::{ApiJson, ApiQuery, ApiResponse, PageQuery, Paginated};
use crate::services::advice::portfolio_context;
use crate::validation::Validator;
use crate::AppState;

pub async fn ask(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<AdviceRequest>,
) -> ApiResult<ApiResponse<Advice>> {
    Validator::new()
        .length("question", &req.question, 1, 1000)
        .finish()?;

    let question = req.question.trim();
    let context = portfolio_context(&state.db, auth.id()).await?;
    let (answer, source) = state.advisor.advise(question, &context).await;

    let advice = AdviceRepo::insert(&state.db, auth.id(), question, &answer, source).await?;
    info!("Answered advice request {} for user {} ({:?})", advice.id, auth.id(), source);
    Ok(ApiResponse::created(advice))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<ApiResponse<Paginated<Advice>>> {
    let (items, total) = AdviceRepo::list(&state.db, auth.id(), page.limit(), page.offset()).await?;
    Ok(ApiResponse::ok(Paginated::new(items, &page, total)))
}
