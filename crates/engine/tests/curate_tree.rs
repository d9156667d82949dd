use curate_engine::{curate_tree, CurateOptions, CurationReport};
use curate_protocol::{ContainerType, ContextSource};
use curate_tree::{ProjectTree, Update, UpdateLog};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn export() -> Value {
    json!({
        "_id": "p1",
        "label": "testproject",
        "files": [
            {"name": "README.txt", "type": "text"},
            {"name": "project-template.json", "type": "source code"}
        ],
        "sessions": [{
            "_id": "s1",
            "label": "sesTEST",
            "subject": {"_id": "sub1", "code": "001"},
            "files": [{"name": "notes.txt", "type": "text"}],
            "acquisitions": [{
                "_id": "a1",
                "label": "acqTEST",
                "files": [
                    {"name": "T1w.nii.gz", "type": "nifti", "measurements": ["anatomy_t1w"]},
                    {"name": "rest.nii.gz", "type": "nifti", "measurements": ["functional"]},
                    {"name": "scan.bin", "type": "binary", "measurements": []}
                ]
            }]
        }]
    })
}

fn file_block<'a>(value: &'a Value, name: &str) -> &'a Value {
    let files = value["sessions"][0]["acquisitions"][0]["files"]
        .as_array()
        .unwrap();
    let file = files.iter().find(|f| f["name"] == json!(name)).unwrap();
    &file["info"]["BIDS"]
}

fn run(tree: &mut ProjectTree, options: CurateOptions) -> (CurationReport, UpdateLog) {
    let mut sink = UpdateLog::new();
    let report = curate_tree(tree, &mut sink, None, options).unwrap();
    (report, sink)
}

#[test]
fn first_run_computes_and_pushes_changed_containers() {
    let mut tree = ProjectTree::from_value(export()).unwrap();
    let (report, sink) = run(&mut tree, CurateOptions::default());

    assert_eq!(
        report,
        CurationReport {
            visited: 9,
            matched: 5,
            unmatched: 1,
            valid: 1,
            invalid: 3,
            pushed: 7,
            skipped: 0,
        }
    );

    let targets: Vec<(String, String)> = sink
        .updates()
        .iter()
        .map(|update| match update {
            Update::ProjectInfo { project_id, .. } => ("project".into(), project_id.clone()),
            Update::SessionInfo { session_id, .. } => ("session".into(), session_id.clone()),
            Update::FileInfo {
                parent_type,
                file_name,
                ..
            } => (parent_type.to_string(), file_name.clone()),
        })
        .collect();
    let expected: Vec<(String, String)> = [
        ("project", "p1"),
        ("project", "README.txt"),
        ("session", "s1"),
        ("session", "notes.txt"),
        ("acquisition", "T1w.nii.gz"),
        ("acquisition", "rest.nii.gz"),
        ("acquisition", "scan.bin"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect();
    assert_eq!(targets, expected);

    let value = tree.to_value();
    let anat = file_block(&value, "T1w.nii.gz");
    assert_eq!(anat["Filename"], json!("sub-001_ses-sestest_acq-acqtest_T1w.nii.gz"));
    assert_eq!(anat["Folder"], json!("anat"));
    assert_eq!(anat["valid"], json!(true));
    assert_eq!(anat["error_message"], json!(""));

    let func = file_block(&value, "rest.nii.gz");
    assert_eq!(func["valid"], json!(false));
    assert_eq!(func["error_message"], json!("Task '' is too short"));

    assert_eq!(file_block(&value, "scan.bin"), &json!("NA"));

    assert_eq!(value["sessions"][0]["info"]["BIDS"], json!({}));
    assert_eq!(value["info"]["BIDS"]["template"], json!("project"));
    assert_eq!(
        value["sessions"][0]["files"][0]["info"]["BIDS"]["Folder"],
        json!("ses-sestest")
    );
    assert!(value["files"][1].get("info").is_none());
}

#[test]
fn second_run_pushes_nothing() {
    let mut tree = ProjectTree::from_value(export()).unwrap();
    run(&mut tree, CurateOptions::default());

    let mut reloaded = ProjectTree::from_value(tree.to_value()).unwrap();
    let (report, sink) = run(&mut reloaded, CurateOptions::default());
    assert_eq!(report.pushed, 0);
    assert!(sink.is_empty());
    assert_eq!(reloaded.to_value(), tree.to_value());
}

#[test]
fn reset_discards_stale_values() {
    let mut stale = export();
    stale["sessions"][0]["acquisitions"][0]["files"][0]["info"] = json!({
        "BIDS": {
            "template": "anat_file",
            "Filename": "old.nii.gz",
            "Modality": "T2w",
            "Acq": "",
            "Custom": "kept without reset"
        }
    });

    let mut kept = ProjectTree::from_value(stale.clone()).unwrap();
    run(&mut kept, CurateOptions::default());
    let value = kept.to_value();
    let block = file_block(&value, "T1w.nii.gz");
    assert_eq!(block["Filename"], json!("sub-001_ses-sestest_T2w.nii.gz"));
    assert_eq!(block["Custom"], json!("kept without reset"));

    let mut reset = ProjectTree::from_value(stale).unwrap();
    run(
        &mut reset,
        CurateOptions {
            reset: true,
            ..CurateOptions::default()
        },
    );
    let value = reset.to_value();
    let block = file_block(&value, "T1w.nii.gz");
    assert_eq!(block["Filename"], json!("sub-001_ses-sestest_acq-acqtest_T1w.nii.gz"));
    assert!(block.get("Custom").is_none());
}

#[test]
fn no_update_computes_without_pushing() {
    let mut tree = ProjectTree::from_value(export()).unwrap();
    let (report, sink) = run(
        &mut tree,
        CurateOptions {
            update: false,
            ..CurateOptions::default()
        },
    );
    assert_eq!(report.pushed, 0);
    assert!(sink.is_empty());
    assert_eq!(tree.dirty_nodes().len(), 7);
}

#[test]
fn unknown_template_is_reported_invalid() {
    let mut doc = export();
    doc["sessions"][0]["acquisitions"][0]["files"][0]["info"] =
        json!({"BIDS": {"template": "retired"}});
    let mut tree = ProjectTree::from_value(doc).unwrap();
    let (report, _) = run(&mut tree, CurateOptions::default());
    assert_eq!(report.invalid, 4);

    let value = tree.to_value();
    let block = file_block(&value, "T1w.nii.gz");
    assert_eq!(block["error_message"], json!("Unknown template: retired. "));
}

#[test]
fn enum_checking_is_opt_in() {
    let mut doc = export();
    doc["sessions"][0]["acquisitions"][0]["files"][1]["info"] = json!({
        "BIDS": {"template": "func_file", "Task": "rest", "Modality": "T1w"}
    });

    let mut lenient = ProjectTree::from_value(doc.clone()).unwrap();
    run(&mut lenient, CurateOptions::default());
    let value = lenient.to_value();
    assert_eq!(file_block(&value, "rest.nii.gz")["valid"], json!(true));

    let mut strict = ProjectTree::from_value(doc).unwrap();
    run(
        &mut strict,
        CurateOptions {
            check_enums: true,
            ..CurateOptions::default()
        },
    );
    let value = strict.to_value();
    let block = file_block(&value, "rest.nii.gz");
    assert_eq!(block["valid"], json!(false));
    assert_eq!(
        block["error_message"],
        json!("Modality 'T1w' is not one of ['bold', 'sbref', 'stim', 'physio']")
    );
}

#[test]
fn walk_is_restartable_after_curation() {
    let mut tree = ProjectTree::from_value(export()).unwrap();
    let before = tree.walk();
    run(&mut tree, CurateOptions::default());
    assert_eq!(tree.walk(), before);
    assert_eq!(tree.kind(before[0]), Some(ContainerType::Project));
}
