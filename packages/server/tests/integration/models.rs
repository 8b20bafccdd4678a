use serde_json::json;

use crate::common::{MAX_UPLOAD_SIZE, OBJ_QUAD, TestApp, routes, stl_tetrahedron};

mod upload {
    use super::*;

    #[tokio::test]
    async fn stl_upload_creates_model() {
        let app = TestApp::spawn().await;
        let token = app.token_for("alice");

        let res = app
            .upload_model(
                "bracket.stl",
                stl_tetrahedron(),
                &[("description", "Mounting bracket")],
                Some(&token),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["name"], "bracket.stl");
        assert_eq!(res.body["description"], "Mounting bracket");
        assert_eq!(res.body["originalFilename"], "bracket.stl");
        assert_eq!(res.body["fileType"], "STL");
        assert_eq!(res.body["fileSize"], stl_tetrahedron().len() as u64);
        assert_eq!(res.body["uploadedBy"], "alice");
        assert_eq!(res.body["viewCount"], 0);
        assert_eq!(res.body["downloadCount"], 0);
        assert_eq!(res.body["convertedFormats"].as_array().unwrap().len(), 0);
        assert_eq!(res.body["defaultView"]["zoom"], 1.0);

        let file_url = res.body["fileUrl"].as_str().unwrap();
        assert!(file_url.starts_with("/uploads/"));
        assert!(file_url.ends_with(".stl"));

        // The created response reflects the stored record, thumbnail included.
        let fetched = app.get_without_token(&routes::model(&res.id())).await;
        assert_eq!(fetched.body["updatedAt"], res.body["updatedAt"]);
        assert_eq!(fetched.body["thumbnailPath"], res.body["thumbnailPath"]);
        assert!(res.body["thumbnailPath"].is_string());
    }

    #[tokio::test]
    async fn explicit_name_and_thumbnail_are_kept() {
        let app = TestApp::spawn().await;
        let token = app.token_for("alice");

        let res = app
            .upload_model(
                "quad.obj",
                OBJ_QUAD.as_bytes().to_vec(),
                &[
                    ("name", "  Floor tile  "),
                    ("thumbnailUrl", "https://cdn.example.com/tile.png"),
                ],
                Some(&token),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["name"], "Floor tile");
        assert_eq!(res.body["fileType"], "OBJ");
        assert_eq!(
            res.body["thumbnailUrl"],
            "https://cdn.example.com/tile.png"
        );
        assert_eq!(app.stored_blobs().len(), 1);
    }

    #[tokio::test]
    async fn requires_token() {
        let app = TestApp::spawn().await;

        let res = app
            .upload_model("bracket.stl", stl_tetrahedron(), &[], None)
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn rejects_forged_token() {
        let app = TestApp::spawn().await;

        let res = app
            .upload_model("bracket.stl", stl_tetrahedron(), &[], Some("not-a-jwt"))
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn rejects_unsupported_extension() {
        let app = TestApp::spawn().await;
        let token = app.token_for("alice");

        let res = app
            .upload_model("scene.fbx", b"binary".to_vec(), &[], Some(&token))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
        assert!(app.stored_blobs().is_empty());
    }

    #[tokio::test]
    async fn rejects_malformed_mesh() {
        let app = TestApp::spawn().await;
        let token = app.token_for("alice");

        let res = app
            .upload_model("broken.obj", b"v 0 0\nf 1 2 9\n".to_vec(), &[], Some(&token))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "MALFORMED_INPUT");
        assert!(app.stored_blobs().is_empty());
    }

    #[tokio::test]
    async fn rejects_oversized_file() {
        let app = TestApp::spawn().await;
        let token = app.token_for("alice");
        let bytes = vec![b' '; MAX_UPLOAD_SIZE as usize + 1024];

        let res = app
            .upload_model("huge.obj", bytes, &[], Some(&token))
            .await;

        assert_eq!(res.status, 413);
        assert_eq!(res.code(), "PAYLOAD_TOO_LARGE");

        let list = app.get_without_token(routes::MODELS).await;
        assert_eq!(list.body["total"], 0);
        assert!(app.stored_blobs().is_empty());
    }

    #[tokio::test]
    async fn rejects_blank_name() {
        let app = TestApp::spawn().await;
        let token = app.token_for("alice");

        let res = app
            .upload_model("bracket.stl", stl_tetrahedron(), &[("name", "   ")], Some(&token))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
        assert!(app.stored_blobs().is_empty());
    }

    #[tokio::test]
    async fn empty_name_uses_filename() {
        let app = TestApp::spawn().await;
        let token = app.token_for("alice");

        let res = app
            .upload_model("bracket.stl", stl_tetrahedron(), &[("name", "")], Some(&token))
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["name"], "bracket.stl");
    }
}

mod listing {
    use super::*;

    async fn seed(app: &TestApp) {
        app.create_model("alice", "gear.stl", stl_tetrahedron()).await;
        app.create_model("alice", "tile.obj", OBJ_QUAD.as_bytes().to_vec())
            .await;
        app.create_model("bob", "Gearbox.stl", stl_tetrahedron()).await;
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let app = TestApp::spawn().await;
        seed(&app).await;

        let res = app.get_without_token(routes::MODELS).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total"], 3);
        let models = res.body["models"].as_array().unwrap();
        assert_eq!(models[0]["name"], "Gearbox.stl");
        assert_eq!(models[2]["name"], "gear.stl");
    }

    #[tokio::test]
    async fn filters_by_file_type() {
        let app = TestApp::spawn().await;
        seed(&app).await;

        let res = app
            .get_without_token(&format!("{}?fileType=OBJ", routes::MODELS))
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total"], 1);
        assert_eq!(res.body["models"][0]["name"], "tile.obj");
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let app = TestApp::spawn().await;
        seed(&app).await;

        let res = app
            .get_without_token(&format!("{}?search=GEAR", routes::MODELS))
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total"], 2);
    }

    #[tokio::test]
    async fn blank_search_matches_everything() {
        let app = TestApp::spawn().await;
        seed(&app).await;

        let res = app
            .get_without_token(&format!("{}?search=%20%20", routes::MODELS))
            .await;

        assert_eq!(res.body["total"], 3);
    }

    #[tokio::test]
    async fn rejects_unknown_file_type() {
        let app = TestApp::spawn().await;

        let res = app
            .get_without_token(&format!("{}?fileType=FBX", routes::MODELS))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn lists_models_of_one_user() {
        let app = TestApp::spawn().await;
        seed(&app).await;

        let res = app.get_without_token(&routes::user_models("alice")).await;
        assert_eq!(res.body["total"], 2);

        let res = app.get_without_token(&routes::user_models("carol")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["total"], 0);
    }
}

mod metadata {
    use super::*;

    #[tokio::test]
    async fn get_missing_model_is_404() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(&routes::missing_model()).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn owner_can_update() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "gear.stl", stl_tetrahedron()).await;
        let token = app.token_for("alice");

        let res = app
            .put_with_token(
                &routes::model(&id),
                &json!({ "name": "Spur gear", "description": "20 teeth" }),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["name"], "Spur gear");
        assert_eq!(res.body["description"], "20 teeth");

        let fetched = app.get_without_token(&routes::model(&id)).await;
        assert_eq!(fetched.body["name"], "Spur gear");
    }

    #[tokio::test]
    async fn other_user_cannot_update() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "gear.stl", stl_tetrahedron()).await;
        let token = app.token_for("mallory");

        let res = app
            .put_with_token(&routes::model(&id), &json!({ "name": "Mine" }), &token)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "PERMISSION_DENIED");

        let fetched = app.get_without_token(&routes::model(&id)).await;
        assert_eq!(fetched.body["name"], "gear.stl");
    }

    #[tokio::test]
    async fn update_rejects_blank_name() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "gear.stl", stl_tetrahedron()).await;
        let token = app.token_for("alice");

        let res = app
            .put_with_token(&routes::model(&id), &json!({ "name": "" }), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }
}

mod conversion {
    use super::*;

    #[tokio::test]
    async fn stl_to_obj_then_cached() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;
        let token = app.token_for("bob");

        let first = app
            .post_with_token(&routes::convert(&id), &json!({ "targetFormat": "OBJ" }), &token)
            .await;

        assert_eq!(first.status, 200, "{}", first.text);
        assert_eq!(first.body["cached"], false);
        assert_eq!(first.body["artifact"]["format"], "OBJ");
        let path = first.body["artifact"]["filePath"].as_str().unwrap().to_string();
        assert!(path.ends_with(".obj"));

        let second = app
            .post_with_token(&routes::convert(&id), &json!({ "targetFormat": "obj" }), &token)
            .await;

        assert_eq!(second.status, 200);
        assert_eq!(second.body["cached"], true);
        assert_eq!(second.body["artifact"]["filePath"], path.as_str());

        let model = app.get_without_token(&routes::model(&id)).await;
        let formats = model.body["convertedFormats"].as_array().unwrap();
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0]["format"], "OBJ");
    }

    #[tokio::test]
    async fn converting_to_own_format_is_rejected() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;
        let token = app.token_for("alice");

        let res = app
            .post_with_token(&routes::convert(&id), &json!({ "targetFormat": "STL" }), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "ALREADY_THIS_FORMAT");
    }

    #[tokio::test]
    async fn obj_to_stl_is_not_implemented_by_default() {
        let app = TestApp::spawn().await;
        let id = app
            .create_model("alice", "tile.obj", OBJ_QUAD.as_bytes().to_vec())
            .await;
        let token = app.token_for("alice");

        let res = app
            .post_with_token(&routes::convert(&id), &json!({ "targetFormat": "STL" }), &token)
            .await;

        assert_eq!(res.status, 501);
        assert_eq!(res.code(), "CONVERSION_UNSUPPORTED");
    }

    #[tokio::test]
    async fn obj_to_stl_when_enabled() {
        let app = TestApp::spawn_with(true).await;
        let id = app
            .create_model("alice", "tile.obj", OBJ_QUAD.as_bytes().to_vec())
            .await;
        let token = app.token_for("alice");

        let res = app
            .post_with_token(&routes::convert(&id), &json!({ "targetFormat": "STL" }), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        // Quad fans into two triangles: 84-byte header plus 50 bytes each.
        assert_eq!(res.body["artifact"]["fileSize"], 184);
    }

    #[tokio::test]
    async fn unknown_target_format_is_rejected() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;
        let token = app.token_for("alice");

        let res = app
            .post_with_token(&routes::convert(&id), &json!({ "targetFormat": "FBX" }), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn convert_requires_token() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;

        let res = app.post_without_token(&routes::convert(&id)).await;

        assert_eq!(res.status, 401);
    }

    #[tokio::test]
    async fn convert_missing_model_is_404() {
        let app = TestApp::spawn().await;
        let token = app.token_for("alice");
        let path = format!("{}/convert", routes::missing_model());

        let res = app
            .post_with_token(&path, &json!({ "targetFormat": "OBJ" }), &token)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod counters {
    use super::*;

    #[tokio::test]
    async fn view_and_download_counts_increase() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "gear.stl", stl_tetrahedron()).await;

        app.post_without_token(&routes::view(&id)).await;
        let res = app.post_without_token(&routes::view(&id)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["viewCount"], 2);

        let res = app.post_without_token(&routes::download(&id)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["downloadCount"], 1);

        let model = app.get_without_token(&routes::model(&id)).await;
        assert_eq!(model.body["viewCount"], 2);
        assert_eq!(model.body["downloadCount"], 1);
    }

    #[tokio::test]
    async fn counters_on_missing_model_are_404() {
        let app = TestApp::spawn().await;
        let path = format!("{}/view", routes::missing_model());

        let res = app.post_without_token(&path).await;

        assert_eq!(res.status, 404);
    }
}

mod download {
    use super::*;

    #[tokio::test]
    async fn streams_original_file() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;
        let token = app.token_for("bob");

        let res = app
            .get_raw(&routes::download_file(&id), Some(&token))
            .await;

        assert_eq!(res.status().as_u16(), 200);
        assert_eq!(res.headers()["content-type"], "model/stl");
        let disposition = res.headers()["content-disposition"].to_str().unwrap();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains("bracket.stl"));
        let body = res.bytes().await.unwrap();
        assert_eq!(body.as_ref(), stl_tetrahedron().as_slice());
    }

    #[tokio::test]
    async fn streams_converted_file() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;
        let token = app.token_for("alice");
        app.post_with_token(&routes::convert(&id), &json!({ "targetFormat": "OBJ" }), &token)
            .await;

        let res = app
            .get_raw(
                &format!("{}?format=OBJ", routes::download_file(&id)),
                Some(&token),
            )
            .await;

        assert_eq!(res.status().as_u16(), 200);
        let disposition = res.headers()["content-disposition"].to_str().unwrap();
        assert!(disposition.contains("bracket.obj"));
        let text = res.text().await.unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 4);
    }

    #[tokio::test]
    async fn unconverted_format_is_404() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;
        let token = app.token_for("alice");

        let res = app
            .get_with_token(
                &format!("{}?format=OBJ", routes::download_file(&id)),
                &token,
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn requires_token() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;

        let res = app.get_without_token(&routes::download_file(&id)).await;

        assert_eq!(res.status, 401);
    }
}

mod geometry {
    use super::*;

    #[tokio::test]
    async fn returns_normalized_buffers() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;

        let res = app.get_without_token(&routes::geometry(&id)).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["format"], "STL");
        assert_eq!(res.body["faceCount"], 4);
        let vertex_count = res.body["vertexCount"].as_u64().unwrap() as usize;
        assert_eq!(
            res.body["positions"].as_array().unwrap().len(),
            vertex_count * 3
        );
        assert_eq!(res.body["normals"].as_array().unwrap().len(), vertex_count * 3);
        assert_eq!(res.body["indices"].as_array().unwrap().len(), 12);
        assert_eq!(res.body["center"].as_array().unwrap().len(), 3);
        assert!(res.body["scale"].as_f64().unwrap() > 0.0);

        for value in res.body["positions"].as_array().unwrap() {
            assert!(value.as_f64().unwrap().abs() <= 1.0 + 1e-4);
        }
    }

    #[tokio::test]
    async fn missing_model_is_404() {
        let app = TestApp::spawn().await;
        let path = format!("{}/geometry", routes::missing_model());

        let res = app.get_without_token(&path).await;

        assert_eq!(res.status, 404);
    }
}

mod default_view {
    use super::*;

    fn view() -> serde_json::Value {
        json!({
            "position": { "x": 1.5, "y": 2.0, "z": 8.0 },
            "rotation": { "x": 0.0, "y": 0.7, "z": 0.0 },
            "zoom": 1.25
        })
    }

    #[tokio::test]
    async fn defaults_before_any_save() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "gear.stl", stl_tetrahedron()).await;

        let res = app.get_without_token(&routes::default_view(&id)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["position"]["z"], 5.0);
        assert_eq!(res.body["zoom"], 1.0);
    }

    #[tokio::test]
    async fn owner_saves_view() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "gear.stl", stl_tetrahedron()).await;
        let token = app.token_for("alice");

        let res = app
            .post_with_token(&routes::default_view(&id), &view(), &token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.get_without_token(&routes::default_view(&id)).await;
        assert_eq!(res.body["position"]["x"], 1.5);
        assert_eq!(res.body["rotation"]["y"], 0.7);
        assert_eq!(res.body["zoom"], 1.25);
    }

    #[tokio::test]
    async fn other_user_cannot_save_view() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "gear.stl", stl_tetrahedron()).await;
        let token = app.token_for("mallory");

        let res = app
            .post_with_token(&routes::default_view(&id), &view(), &token)
            .await;

        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn rejects_non_positive_zoom() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "gear.stl", stl_tetrahedron()).await;
        let token = app.token_for("alice");
        let mut body = view();
        body["zoom"] = json!(0.0);

        let res = app
            .post_with_token(&routes::default_view(&id), &body, &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn owner_deletes_model_and_files() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;
        let token = app.token_for("alice");
        app.post_with_token(&routes::convert(&id), &json!({ "targetFormat": "OBJ" }), &token)
            .await;
        assert!(!app.stored_blobs().is_empty());

        let res = app.delete_with_token(&routes::model(&id), &token).await;
        assert_eq!(res.status, 204);

        let res = app.get_without_token(&routes::model(&id)).await;
        assert_eq!(res.status, 404);
        assert!(app.stored_blobs().is_empty());
    }

    #[tokio::test]
    async fn other_user_cannot_delete() {
        let app = TestApp::spawn().await;
        let id = app.create_model("alice", "bracket.stl", stl_tetrahedron()).await;
        let token = app.token_for("mallory");

        let res = app.delete_with_token(&routes::model(&id), &token).await;

        assert_eq!(res.status, 403);
        let res = app.get_without_token(&routes::model(&id)).await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn deleting_missing_model_is_404() {
        let app = TestApp::spawn().await;
        let token = app.token_for("alice");

        let res = app
            .delete_with_token(&routes::missing_model(), &token)
            .await;

        assert_eq!(res.status, 404);
    }
}
