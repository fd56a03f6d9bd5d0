table! {
    announcements (id) {
        id -> Integer,
        title -> Text,
        description -> Text,
        open_time -> Timestamp,
    }
}

table! {
    announcement_files (id) {
        id -> Integer,
        announcement_id -> Integer,
        file_name -> Text,
    }
}

table! {
    teams (id) {
        id -> Integer,
        name -> Text,
    }
}

table! {
    rounds (id) {
        id -> Integer,
        start_time -> Timestamp,
    }
}

table! {
    service_checks (team_id, round_id, service_name) {
        team_id -> Integer,
        round_id -> Integer,
        service_name -> Text,
        points -> Integer,
        result -> Bool,
        error -> Text,
        debug -> Text,
    }
}

table! {
    slas (id) {
        id -> Integer,
        team_id -> Integer,
        round_id -> Integer,
        service_name -> Text,
        penalty -> Integer,
    }
}

table! {
    manual_adjustments (id) {
        id -> Integer,
        team_id -> Integer,
        amount -> Integer,
        reason -> Text,
        created_at -> Timestamp,
    }
}

table! {
    injects (id) {
        id -> Integer,
        title -> Text,
        description -> Text,
        open_time -> Timestamp,
        due_time -> Timestamp,
        close_time -> Timestamp,
    }
}

table! {
    inject_files (id) {
        id -> Integer,
        inject_id -> Integer,
        file_name -> Text,
    }
}

table! {
    submissions (id) {
        id -> Integer,
        inject_id -> Integer,
        team_id -> Integer,
        submission_time -> Timestamp,
        file_name -> Text,
        graded -> Bool,
        score -> Integer,
    }
}

table! {
    vulns (id) {
        id -> Integer,
        name -> Text,
        description -> Text,
    }
}

table! {
    boxes (id) {
        id -> Integer,
        ip -> Text,
        hostname -> Nullable<Text>,
    }
}

table! {
    box_ports (box_id, port) {
        box_id -> Integer,
        port -> Integer,
    }
}

table! {
    vectors (id) {
        id -> Integer,
        box_id -> Integer,
        vuln_id -> Nullable<Integer>,
        port -> Integer,
        protocol -> Text,
    }
}

table! {
    attacks (id) {
        id -> Integer,
        box_id -> Integer,
        vector_id -> Nullable<Integer>,
        team_id -> Nullable<Integer>,
        created_at -> Timestamp,
    }
}

table! {
    attack_images (id) {
        id -> Integer,
        attack_id -> Integer,
        file_name -> Text,
    }
}

joinable!(announcement_files -> announcements (announcement_id));
joinable!(service_checks -> teams (team_id));
joinable!(service_checks -> rounds (round_id));
joinable!(slas -> teams (team_id));
joinable!(slas -> rounds (round_id));
joinable!(manual_adjustments -> teams (team_id));
joinable!(inject_files -> injects (inject_id));
joinable!(submissions -> injects (inject_id));
joinable!(submissions -> teams (team_id));
joinable!(box_ports -> boxes (box_id));
joinable!(vectors -> boxes (box_id));
joinable!(vectors -> vulns (vuln_id));
joinable!(attacks -> boxes (box_id));
joinable!(attacks -> vectors (vector_id));
joinable!(attacks -> teams (team_id));
joinable!(attack_images -> attacks (attack_id));

allow_tables_to_appear_in_same_query!(
    announcements,
    announcement_files,
    teams,
    rounds,
    service_checks,
    slas,
    manual_adjustments,
    injects,
    inject_files,
    submissions,
    vulns,
    boxes,
    box_ports,
    vectors,
    attacks,
    attack_images,
);
