use crate::config::jwt_auth::JwtMiddleware;
use crate::model::challenge::NewChallengeRequest;
use crate::model::error::ScoringError;
use crate::model::fixture::{MatchCommand, NewMatchRequest, SquadRequest};
use crate::model::innings::{DeliveryInput, InningCommand, OpenInningsRequest};
use crate::model::response::{ApiResponse, ExpiredChallenges, MessageResponse};
use crate::model::tournament::{NewTournamentRequest, TournamentCommand};
use crate::service::challenge::ChallengeResponse;
use crate::AppState;
use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Path};
use actix_web::{delete, get, post, put, web, HttpResponse, ResponseError};
use chrono::Utc;
use log::error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

type HandlerResult = Result<HttpResponse, ScoringError>;

impl ResponseError for ScoringError {
    fn status_code(&self) -> StatusCode {
        match self {
            ScoringError::Validation(_) => StatusCode::BAD_REQUEST,
            ScoringError::InvalidState { .. }
            | ScoringError::Ordering(_)
            | ScoringError::NotOpen
            | ScoringError::DeadlineExpired
            | ScoringError::CapacityExceeded { .. }
            | ScoringError::AlreadyRegistered
            | ScoringError::ConcurrencyConflict => StatusCode::CONFLICT,
            ScoringError::NotFound { .. } => StatusCode::NOT_FOUND,
            ScoringError::Forbidden(_) => StatusCode::FORBIDDEN,
            ScoringError::InvalidReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScoringError::CorruptRow { .. } | ScoringError::Database(_) | ScoringError::Pool(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("An error occurred while handling a request. The error: {:?}", self);
            return HttpResponse::build(status).json(MessageResponse::error("An error occurred"));
        }
        HttpResponse::build(status).json(MessageResponse::failed(self.to_string()))
    }
}

fn ok<T: Serialize>(data: T) -> HandlerResult {
    Ok(HttpResponse::Ok().json(ApiResponse::success(data)))
}

fn created<T: Serialize>(data: T) -> HandlerResult {
    Ok(HttpResponse::Created().json(ApiResponse::success(data)))
}

#[derive(Debug, Deserialize)]
pub struct InningCommandRequest {
    pub command: InningCommand,
}

#[derive(Debug, Deserialize)]
pub struct RegisterTeamRequest {
    pub team_id: Uuid,
}

// ==================== Challenges ====================

#[post("/challenges")]
async fn create_challenge_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    body: Json<NewChallengeRequest>,
) -> HandlerResult {
    created(data.service.create_challenge(&auth.actor, body.into_inner(), Utc::now()).await?)
}

#[get("/challenges/{id}")]
async fn get_challenge_handler(data: Data<AppState>, _auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    ok(data.service.find_challenge(id.into_inner()).await?)
}

#[post("/challenges/{id}/accept")]
async fn accept_challenge_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    id: Path<Uuid>,
    body: Json<ChallengeResponse>,
) -> HandlerResult {
    created(
        data.service
            .accept_challenge(&auth.actor, id.into_inner(), body.party, Utc::now())
            .await?,
    )
}

#[post("/challenges/{id}/reject")]
async fn reject_challenge_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    id: Path<Uuid>,
    body: Json<ChallengeResponse>,
) -> HandlerResult {
    ok(data
        .service
        .reject_challenge(&auth.actor, id.into_inner(), body.party, Utc::now())
        .await?)
}

#[post("/challenges/{id}/cancel")]
async fn cancel_challenge_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    id: Path<Uuid>,
    body: Json<ChallengeResponse>,
) -> HandlerResult {
    ok(data
        .service
        .cancel_challenge(&auth.actor, id.into_inner(), body.party, Utc::now())
        .await?)
}

#[post("/challenges/expire")]
async fn expire_challenges_handler(data: Data<AppState>, auth: JwtMiddleware) -> HandlerResult {
    if !auth.actor.is_admin {
        return Err(ScoringError::Forbidden(
            "only administrators can run the expiry sweep".to_string(),
        ));
    }
    let expired = data.service.expire_challenges(Utc::now()).await?;
    ok(ExpiredChallenges { expired })
}

// ==================== Matches ====================

#[post("/matches")]
async fn create_match_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    body: Json<NewMatchRequest>,
) -> HandlerResult {
    created(data.service.create_match(&auth.actor, body.into_inner(), Utc::now()).await?)
}

#[get("/matches/{id}")]
async fn get_match_handler(data: Data<AppState>, _auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    ok(data.service.find_match(id.into_inner()).await?)
}

#[post("/matches/{id}/commands")]
async fn match_command_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    id: Path<Uuid>,
    body: Json<MatchCommand>,
) -> HandlerResult {
    ok(data
        .service
        .apply_match_command(&auth.actor, id.into_inner(), body.into_inner(), Utc::now())
        .await?)
}

#[delete("/matches/{id}")]
async fn remove_match_handler(data: Data<AppState>, auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    data.service
        .remove_match(&auth.actor, id.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[put("/matches/{id}/squad")]
async fn select_squad_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    id: Path<Uuid>,
    body: Json<SquadRequest>,
) -> HandlerResult {
    ok(data
        .service
        .select_squad(&auth.actor, id.into_inner(), body.into_inner())
        .await?)
}

#[post("/matches/{id}/innings")]
async fn open_innings_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    id: Path<Uuid>,
    body: Json<OpenInningsRequest>,
) -> HandlerResult {
    created(
        data.service
            .open_innings(&auth.actor, id.into_inner(), body.into_inner(), Utc::now())
            .await?,
    )
}

#[get("/matches/{id}/innings")]
async fn match_innings_handler(data: Data<AppState>, _auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    ok(data.service.match_innings(id.into_inner()).await?)
}

#[get("/matches/{id}/stats")]
async fn match_stats_handler(data: Data<AppState>, _auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    ok(data.service.match_stats(id.into_inner()).await?)
}

#[post("/matches/{id}/stats/recompute")]
async fn recompute_match_stats_handler(
    data: Data<AppState>,
    _auth: JwtMiddleware,
    id: Path<Uuid>,
) -> HandlerResult {
    ok(data.service.rollup_match(id.into_inner(), Utc::now()).await?)
}

#[post("/matches/{id}/stats/{user_id}/recompute")]
async fn recompute_player_stat_handler(
    data: Data<AppState>,
    _auth: JwtMiddleware,
    path: Path<(Uuid, Uuid)>,
) -> HandlerResult {
    let (id, user_id) = path.into_inner();
    ok(data
        .service
        .recompute_player_match_stat(id, user_id, Utc::now())
        .await?)
}

// ==================== Innings ====================

#[get("/innings/{id}")]
async fn scorecard_handler(data: Data<AppState>, _auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    ok(data.service.scorecard(id.into_inner()).await?)
}

#[post("/innings/{id}/deliveries")]
async fn record_delivery_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    id: Path<Uuid>,
    body: Json<DeliveryInput>,
) -> HandlerResult {
    created(
        data.service
            .record_delivery(&auth.actor, id.into_inner(), body.into_inner(), Utc::now())
            .await?,
    )
}

#[post("/innings/{id}/commands")]
async fn inning_command_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    id: Path<Uuid>,
    body: Json<InningCommandRequest>,
) -> HandlerResult {
    ok(data
        .service
        .apply_inning_command(&auth.actor, id.into_inner(), body.command, Utc::now())
        .await?)
}

#[post("/innings/{id}/rebuild")]
async fn rebuild_innings_handler(data: Data<AppState>, auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    ok(data.service.rebuild_innings(&auth.actor, id.into_inner()).await?)
}

// ==================== Players ====================

#[get("/players/{id}/stats")]
async fn career_stats_handler(data: Data<AppState>, _auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    ok(data.service.career_stats(id.into_inner()).await?)
}

#[post("/players/{id}/stats/recompute")]
async fn recompute_career_handler(data: Data<AppState>, _auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    ok(data.service.recompute_career(id.into_inner(), Utc::now()).await?)
}

// ==================== Tournaments ====================

#[post("/tournaments")]
async fn create_tournament_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    body: Json<NewTournamentRequest>,
) -> HandlerResult {
    created(
        data.service
            .create_tournament(&auth.actor, body.into_inner(), Utc::now())
            .await?,
    )
}

#[get("/tournaments/{id}")]
async fn get_tournament_handler(data: Data<AppState>, _auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    ok(data.service.find_tournament(id.into_inner()).await?)
}

#[post("/tournaments/{id}/commands")]
async fn tournament_command_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    id: Path<Uuid>,
    body: Json<TournamentCommand>,
) -> HandlerResult {
    ok(data
        .service
        .apply_tournament_command(&auth.actor, id.into_inner(), body.into_inner(), Utc::now())
        .await?)
}

#[get("/tournaments/{id}/teams")]
async fn tournament_teams_handler(data: Data<AppState>, _auth: JwtMiddleware, id: Path<Uuid>) -> HandlerResult {
    ok(data.service.tournament_teams(id.into_inner()).await?)
}

#[post("/tournaments/{id}/teams")]
async fn register_team_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    id: Path<Uuid>,
    body: Json<RegisterTeamRequest>,
) -> HandlerResult {
    let (tournament, entry) = data
        .service
        .register_team(&auth.actor, id.into_inner(), body.team_id, Utc::now())
        .await?;
    created(serde_json::json!({ "tournament": tournament, "registration": entry }))
}

#[delete("/tournaments/{id}/teams/{team_id}")]
async fn unregister_team_handler(
    data: Data<AppState>,
    auth: JwtMiddleware,
    path: Path<(Uuid, Uuid)>,
) -> HandlerResult {
    let (id, team_id) = path.into_inner();
    ok(data
        .service
        .unregister_team(&auth.actor, id, team_id, Utc::now())
        .await?)
}

pub fn config(conf: &mut web::ServiceConfig) {
    let scope = web::scope("/api/v1")
        .service(expire_challenges_handler)
        .service(create_challenge_handler)
        .service(get_challenge_handler)
        .service(accept_challenge_handler)
        .service(reject_challenge_handler)
        .service(cancel_challenge_handler)
        .service(create_match_handler)
        .service(get_match_handler)
        .service(match_command_handler)
        .service(remove_match_handler)
        .service(select_squad_handler)
        .service(open_innings_handler)
        .service(match_innings_handler)
        .service(match_stats_handler)
        .service(recompute_match_stats_handler)
        .service(recompute_player_stat_handler)
        .service(scorecard_handler)
        .service(record_delivery_handler)
        .service(inning_command_handler)
        .service(rebuild_innings_handler)
        .service(career_stats_handler)
        .service(recompute_career_handler)
        .service(create_tournament_handler)
        .service(get_tournament_handler)
        .service(tournament_command_handler)
        .service(tournament_teams_handler)
        .service(register_team_handler)
        .service(unregister_team_handler);

    conf.service(scope);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(ScoringError::validation("bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ScoringError::NotOpen.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ScoringError::CapacityExceeded { max_teams: 8 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ScoringError::not_found("match", Uuid::nil()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ScoringError::InvalidReference("team".to_string()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ScoringError::Pool("timed out".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn infrastructure_errors_hide_details() {
        let response = ScoringError::Pool("password authentication failed".to_string()).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "An error occurred");

        let response = ScoringError::AlreadyRegistered.error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "failed");
        assert_eq!(body["message"], "team is already registered for this tournament");
    }
}
