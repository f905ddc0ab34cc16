//! HTTP routes. Upload and trigger are separate requests: an upload only
//! decodes and stores the image, and the model is contacted only from
//! `/sessions/{id}/classify`.

use super::protocol::{CreatedSession, ImageInfo, PresetResponse, SessionStatus};
use super::{page, AppState, WebError};
use crate::error::Error;
use crate::ingest::UploadedImage;
use crate::session::{self, SessionStore};
use actix_multipart::Multipart;
use actix_web::http::header::ContentType;
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use futures_util::StreamExt;
use std::sync::{RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};
use uuid::Uuid;

type Result<T> = std::result::Result<T, WebError>;

impl AppState {
    fn read(&self) -> RwLockReadGuard<'_, SessionStore> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionStore> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Register every route on an app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(preset)
        .service(create_session)
        .service(session_status)
        .service(end_session)
        .service(upload_image)
        .service(image_echo)
        .service(classify);
}

/// The single page front end
#[get("/")]
pub async fn index(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(page::render(state.classifier.wording()))
}

/// The active preset's wording
#[get("/preset")]
pub async fn preset(state: web::Data<AppState>) -> impl Responder {
    web::Json(PresetResponse {
        preset: state.classifier.preset(),
        wording: state.classifier.wording(),
    })
}

#[post("/sessions")]
pub async fn create_session(state: web::Data<AppState>) -> impl Responder {
    let id = state.write().create();
    web::Json(CreatedSession { id })
}

#[get("/sessions/{id}")]
pub async fn session_status(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<impl Responder> {
    let id = path.into_inner();
    let mut store = state.write();
    store.touch(id)?;
    Ok(web::Json(SessionStatus::new(id, store.get(id)?)))
}

#[delete("/sessions/{id}")]
pub async fn end_session(path: web::Path<Uuid>, state: web::Data<AppState>) -> Result<HttpResponse> {
    state.write().remove(path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}

/// Read the first file field of a multipart upload, declared by its file
/// name's extension
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> crate::Result<UploadedImage> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| Error::Upload(e.to_string()))?;
        let filename = field
            .content_disposition()
            .get_filename()
            .map(|name| name.to_string());
        let Some(filename) = filename else {
            continue;
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| Error::Upload(e.to_string()))?;
            if bytes.len() + data.len() > max_bytes {
                return Err(Error::Upload(format!(
                    "the uploaded file is too large (max: {max_bytes} bytes)"
                )));
            }
            bytes.extend_from_slice(&data);
        }
        return UploadedImage::from_file(&filename, bytes);
    }
    Err(Error::Upload("no file was provided".into()))
}

/// Upload an image into a session. Decodes it right away so bad files are
/// reported before any classification is attempted.
#[post("/sessions/{id}/image")]
pub async fn upload_image(
    path: web::Path<Uuid>,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<impl Responder> {
    let id = path.into_inner();
    // Fail on an unknown session before reading the body
    state.write().touch(id)?;

    let max_bytes = state.max_upload_bytes;
    let upload = read_upload(payload, max_bytes).await?;
    info!("session {id}: received {:?}", upload);

    let image = tokio::task::spawn_blocking(move || upload.decode(max_bytes))
        .await?
        .map_err(|e| {
            warn!("session {id}: rejected upload: {e}");
            e
        })?;
    let info = ImageInfo {
        width: image.width(),
        height: image.height(),
    };

    state.write().load_image(id, image)?;
    Ok(web::Json(info))
}

/// Echo the loaded image back as PNG
#[get("/sessions/{id}/image")]
pub async fn image_echo(path: web::Path<Uuid>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let id = path.into_inner();
    let image = state.read().get(id)?.image().ok_or(Error::NoImage)?;

    let png = tokio::task::spawn_blocking(move || image.to_png()).await??;
    Ok(HttpResponse::Ok().content_type("image/png").body(png))
}

/// Start classification of the session's image and wait for the verdict
#[post("/sessions/{id}/classify")]
pub async fn classify(path: web::Path<Uuid>, state: web::Data<AppState>) -> Result<impl Responder> {
    let id = path.into_inner();
    let classifier = state.classifier.clone();

    match session::classify_session(state.sessions.clone(), classifier, id).await {
        Ok(verdict) => Ok(web::Json(verdict)),
        Err(e) if e.is_remote() => {
            let message = state.classifier.error_message(&e);
            Err(WebError::with_message(e, message))
        }
        Err(e) => Err(e.into()),
    }
}
