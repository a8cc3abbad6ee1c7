use axum::{extract::Path, Extension, Json};
use uuid::Uuid;

use crate::database::models::group::{AddMember, ChangeRole, CreateGroup, Group, GroupMember};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::GroupService;

/// GET /api/groups - groups the caller belongs to
pub async fn list(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Group>> {
    let groups = GroupService::new().await?.list(user.user_id).await?;
    Ok(ApiResponse::success(groups))
}

/// POST /api/groups - create a group with the caller as admin
pub async fn create(Extension(user): Extension<AuthUser>, Json(input): Json<CreateGroup>) -> ApiResult<Group> {
    let group = GroupService::new().await?.create(user.user_id, &input.name).await?;
    Ok(ApiResponse::created(group))
}

/// PUT /api/groups/:id - rename (admin)
pub async fn rename(
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<Uuid>,
    Json(input): Json<CreateGroup>,
) -> ApiResult<Group> {
    let group = GroupService::new()
        .await?
        .rename(user.user_id, group_id, &input.name)
        .await?;
    Ok(ApiResponse::success(group))
}

/// DELETE /api/groups/:id - delete with everything shared in it (admin)
pub async fn delete(Extension(user): Extension<AuthUser>, Path(group_id): Path<Uuid>) -> ApiResult<()> {
    GroupService::new().await?.delete(user.user_id, group_id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/groups/:id/members
pub async fn members(Extension(user): Extension<AuthUser>, Path(group_id): Path<Uuid>) -> ApiResult<Vec<GroupMember>> {
    let members = GroupService::new().await?.members(user.user_id, group_id).await?;
    Ok(ApiResponse::success(members))
}

/// POST /api/groups/:id/members - add by email (admin)
pub async fn add_member(
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<Uuid>,
    Json(input): Json<AddMember>,
) -> ApiResult<GroupMember> {
    let member = GroupService::new()
        .await?
        .add_member(user.user_id, group_id, &input.email, input.role)
        .await?;
    Ok(ApiResponse::created(member))
}

/// PUT /api/groups/:id/members/:user_id - change role (admin)
pub async fn change_role(
    Extension(user): Extension<AuthUser>,
    Path((group_id, member_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ChangeRole>,
) -> ApiResult<GroupMember> {
    let member = GroupService::new()
        .await?
        .change_role(user.user_id, group_id, member_id, input.role)
        .await?;
    Ok(ApiResponse::success(member))
}

/// DELETE /api/groups/:id/members/:user_id - remove a member (admin) or leave (self)
pub async fn remove_member(
    Extension(user): Extension<AuthUser>,
    Path((group_id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    GroupService::new()
        .await?
        .remove_member(user.user_id, group_id, member_id)
        .await?;
    Ok(ApiResponse::no_content())
}
