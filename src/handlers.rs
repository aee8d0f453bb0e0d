use actix_cors::Cors;
use actix_multipart::{Field, Multipart};
use actix_web::http::header;
use actix_web::http::Method;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use futures_util::StreamExt;

use crate::classifier::ModelHandle;
use crate::error::PredictError;
use crate::models::PredictionResponse;
use crate::preprocess;

/// State shared by every request. Built once in `main`, never mutated.
pub struct AppState {
    pub model: ModelHandle,
    pub max_upload_bytes: usize,
}

/// Registers `/predict` with its CORS policy.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let cors = Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allow_any_method()
        .allow_any_header()
        .disable_preflight();

    cfg.service(
        web::resource("/predict")
            .wrap(cors)
            .route(web::post().to(predict))
            .route(web::method(Method::OPTIONS).to(preflight)),
    );
}

pub async fn preflight(req: HttpRequest) -> HttpResponse {
    let mut res = HttpResponse::NoContent();
    res.insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"));
    if let Some(requested) = req.headers().get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
        res.insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone()));
    }
    res.finish()
}

pub async fn predict(
    req: HttpRequest,
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    // Anything but a multipart form carries no files.
    if !is_multipart(&req) {
        return Err(PredictError::NoImage);
    }

    let upload = read_image_field(&mut payload, state.max_upload_bytes).await?;
    let model = state.model.clone().ok_or(PredictError::ModelNotLoaded)?;

    let probability = web::block(move || -> Result<f32, PredictError> {
        let tensor = preprocess::preprocess(&upload)?;
        Ok(model.predict(tensor)?)
    })
    .await??;

    let response = PredictionResponse::from_probability(probability);
    log::debug!(
        "predicted {:?} with confidence {}",
        response.prediction,
        response.confidence
    );

    Ok(HttpResponse::Ok().json(response))
}

fn is_multipart(req: &HttpRequest) -> bool {
    matches!(req.mime_type(), Ok(Some(mime)) if mime.type_() == "multipart")
}

/// Pulls the first `image` file out of the form, draining everything else.
async fn read_image_field(
    payload: &mut Multipart,
    limit: usize,
) -> Result<Vec<u8>, PredictError> {
    let mut image: Option<Vec<u8>> = None;
    let mut empty_filename = false;

    while let Some(item) = payload.next().await {
        let mut field = item?;

        let wanted = image.is_none() && !empty_filename && is_image_file(&field);
        if !wanted {
            drain(&mut field).await?;
            continue;
        }

        let filename_is_empty = field
            .content_disposition()
            .get_filename()
            .map_or(true, str::is_empty);
        if filename_is_empty {
            empty_filename = true;
            drain(&mut field).await?;
            continue;
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > limit {
                return Err(PredictError::PayloadTooLarge(limit));
            }
            data.extend_from_slice(&chunk);
        }
        image = Some(data);
    }

    match image {
        Some(data) => Ok(data),
        None if empty_filename => Err(PredictError::EmptyFilename),
        None => Err(PredictError::NoImage),
    }
}

/// A file field named `image`. Plain text fields carry no filename.
fn is_image_file(field: &Field) -> bool {
    let cd = field.content_disposition();
    cd.get_name() == Some("image") && cd.get_filename().is_some()
}

async fn drain(field: &mut Field) -> Result<(), PredictError> {
    while let Some(chunk) = field.next().await {
        chunk?;
    }
    Ok(())
}
