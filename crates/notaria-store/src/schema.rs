//! Table definitions. Every statement is idempotent; [`Store::migrate`]
//! runs the whole batch on open.
//!
//! Ids come from sequences. Timestamps and dates are ISO-8601 text, lists and
//! provider payloads are JSON text. There are no FOREIGN KEY clauses: delete
//! rules (cascade / set null) are applied by the repository methods inside
//! one transaction.
//!
//! [`Store::migrate`]: crate::Store::migrate

pub const SCHEMA: &str = r#"
CREATE SEQUENCE IF NOT EXISTS seq_users START 1;
CREATE TABLE IF NOT EXISTS users (
    id              BIGINT PRIMARY KEY DEFAULT nextval('seq_users'),
    username        VARCHAR NOT NULL UNIQUE,
    email           VARCHAR NOT NULL,
    password_hash   VARCHAR NOT NULL,
    role            VARCHAR NOT NULL DEFAULT 'paid_user',
    is_superuser    BOOLEAN NOT NULL DEFAULT false,
    is_active       BOOLEAN NOT NULL DEFAULT true,
    phone_number    VARCHAR,
    address         VARCHAR,
    created_at      VARCHAR NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS seq_clients START 1;
CREATE TABLE IF NOT EXISTS clients (
    id                  BIGINT PRIMARY KEY DEFAULT nextval('seq_clients'),
    client_type         VARCHAR NOT NULL DEFAULT 'individual',
    first_name          VARCHAR,
    last_name           VARCHAR,
    date_of_birth       VARCHAR,
    business_name       VARCHAR,
    registration_number VARCHAR,
    email               VARCHAR,
    phone_number        VARCHAR,
    address             VARCHAR,
    status              VARCHAR NOT NULL DEFAULT 'lead',
    notes               VARCHAR,
    segmentation_tags   VARCHAR,
    created_by          BIGINT,
    created_at          VARCHAR NOT NULL,
    updated_at          VARCHAR NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS seq_leads START 1;
CREATE TABLE IF NOT EXISTS leads (
    id              BIGINT PRIMARY KEY DEFAULT nextval('seq_leads'),
    name            VARCHAR NOT NULL,
    email           VARCHAR,
    phone_number    VARCHAR,
    source          VARCHAR,
    status          VARCHAR NOT NULL DEFAULT 'new',
    notes           VARCHAR,
    assigned_to     BIGINT,
    created_at      VARCHAR NOT NULL,
    updated_at      VARCHAR NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS seq_matters START 1;
CREATE TABLE IF NOT EXISTS matters (
    id              BIGINT PRIMARY KEY DEFAULT nextval('seq_matters'),
    protocol_number VARCHAR NOT NULL UNIQUE,
    title           VARCHAR NOT NULL,
    description     VARCHAR,
    status          VARCHAR NOT NULL DEFAULT 'open',
    start_date      VARCHAR NOT NULL,
    due_date        VARCHAR,
    completion_date VARCHAR,
    notes           VARCHAR,
    created_by      BIGINT,
    created_at      VARCHAR NOT NULL,
    updated_at      VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS matter_clients (
    matter_id   BIGINT NOT NULL,
    client_id   BIGINT NOT NULL,
    PRIMARY KEY (matter_id, client_id)
);

CREATE TABLE IF NOT EXISTS matter_users (
    matter_id   BIGINT NOT NULL,
    user_id     BIGINT NOT NULL,
    PRIMARY KEY (matter_id, user_id)
);

CREATE SEQUENCE IF NOT EXISTS seq_workflow_templates START 1;
CREATE TABLE IF NOT EXISTS workflow_templates (
    id          BIGINT PRIMARY KEY DEFAULT nextval('seq_workflow_templates'),
    name        VARCHAR NOT NULL UNIQUE,
    description VARCHAR,
    created_at  VARCHAR NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS seq_step_templates START 1;
CREATE TABLE IF NOT EXISTS step_templates (
    id          BIGINT PRIMARY KEY DEFAULT nextval('seq_step_templates'),
    template_id BIGINT NOT NULL,
    name        VARCHAR NOT NULL,
    description VARCHAR,
    step_order  INTEGER NOT NULL,
    is_required BOOLEAN NOT NULL DEFAULT true,
    UNIQUE (template_id, step_order)
);

CREATE SEQUENCE IF NOT EXISTS seq_workflows START 1;
CREATE TABLE IF NOT EXISTS workflows (
    id                  BIGINT PRIMARY KEY DEFAULT nextval('seq_workflows'),
    matter_id           BIGINT NOT NULL UNIQUE,
    template_id         BIGINT,
    status              VARCHAR NOT NULL DEFAULT 'not_started',
    initiated_at        VARCHAR NOT NULL,
    completed_at        VARCHAR,
    ai_generated_steps  VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS seq_workflow_steps START 1;
CREATE TABLE IF NOT EXISTS workflow_steps (
    id                  BIGINT PRIMARY KEY DEFAULT nextval('seq_workflow_steps'),
    workflow_id         BIGINT NOT NULL,
    step_template_id    BIGINT,
    name                VARCHAR NOT NULL,
    description         VARCHAR,
    step_order          INTEGER NOT NULL,
    status              VARCHAR NOT NULL DEFAULT 'not_started',
    assigned_to         BIGINT,
    due_date            VARCHAR,
    completed_at        VARCHAR,
    notes               VARCHAR,
    UNIQUE (workflow_id, step_order)
);

CREATE SEQUENCE IF NOT EXISTS seq_compliance_templates START 1;
CREATE TABLE IF NOT EXISTS compliance_templates (
    id          BIGINT PRIMARY KEY DEFAULT nextval('seq_compliance_templates'),
    name        VARCHAR NOT NULL UNIQUE,
    description VARCHAR,
    created_at  VARCHAR NOT NULL,
    updated_at  VARCHAR NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS seq_compliance_questions START 1;
CREATE TABLE IF NOT EXISTS compliance_questions (
    id              BIGINT PRIMARY KEY DEFAULT nextval('seq_compliance_questions'),
    question_text   VARCHAR NOT NULL,
    answer_type     VARCHAR NOT NULL DEFAULT 'text',
    choice_options  VARCHAR,
    is_required     BOOLEAN NOT NULL DEFAULT true
);

CREATE TABLE IF NOT EXISTS compliance_template_questions (
    template_id     BIGINT NOT NULL,
    question_id     BIGINT NOT NULL,
    question_order  INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (template_id, question_id)
);

CREATE SEQUENCE IF NOT EXISTS seq_compliance_checks START 1;
CREATE TABLE IF NOT EXISTS compliance_checks (
    id                      BIGINT PRIMARY KEY DEFAULT nextval('seq_compliance_checks'),
    client_id               BIGINT,
    matter_id               BIGINT,
    template_id             BIGINT,
    initiated_by            BIGINT,
    initiated_at            VARCHAR NOT NULL,
    completed_at            VARCHAR,
    status                  VARCHAR NOT NULL DEFAULT 'pending',
    credas_check_id         VARCHAR,
    credas_result           VARCHAR,
    peps_sanctions_check_id VARCHAR,
    peps_sanctions_result   VARCHAR,
    notes                   VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS seq_compliance_answers START 1;
CREATE TABLE IF NOT EXISTS compliance_answers (
    id              BIGINT PRIMARY KEY DEFAULT nextval('seq_compliance_answers'),
    check_id        BIGINT NOT NULL,
    question_id     BIGINT NOT NULL,
    answer_text     VARCHAR,
    answer_boolean  BOOLEAN,
    answer_choice   VARCHAR,
    answer_date     VARCHAR,
    answer_file     VARCHAR,
    answered_by     BIGINT,
    answered_at     VARCHAR NOT NULL,
    UNIQUE (check_id, question_id)
);

CREATE SEQUENCE IF NOT EXISTS seq_documents START 1;
CREATE TABLE IF NOT EXISTS documents (
    id                  BIGINT PRIMARY KEY DEFAULT nextval('seq_documents'),
    uploaded_by         BIGINT NOT NULL,
    file                VARCHAR NOT NULL,
    name                VARCHAR NOT NULL,
    file_type           VARCHAR NOT NULL,
    file_size           BIGINT NOT NULL,
    upload_date         VARCHAR NOT NULL,
    client_id           BIGINT,
    matter_id           BIGINT,
    summary             VARCHAR,
    segmentation_result VARCHAR,
    status              VARCHAR NOT NULL DEFAULT 'uploaded'
);

CREATE SEQUENCE IF NOT EXISTS seq_integrations START 1;
CREATE TABLE IF NOT EXISTS integrations (
    id                      BIGINT PRIMARY KEY DEFAULT nextval('seq_integrations'),
    service_name            VARCHAR NOT NULL UNIQUE,
    is_enabled              BOOLEAN NOT NULL DEFAULT false,
    api_key                 VARCHAR,
    api_secret              VARCHAR,
    google_access_token     VARCHAR,
    google_refresh_token    VARCHAR,
    google_token_expires_at VARCHAR,
    google_token_scope      VARCHAR
);

CREATE SEQUENCE IF NOT EXISTS seq_integration_logs START 1;
CREATE TABLE IF NOT EXISTS integration_logs (
    id                  BIGINT PRIMARY KEY DEFAULT nextval('seq_integration_logs'),
    integration_id      BIGINT,
    level               VARCHAR NOT NULL DEFAULT 'INFO',
    message             VARCHAR NOT NULL,
    logged_at           VARCHAR NOT NULL,
    related_object_type VARCHAR,
    related_object_id   VARCHAR
);
"#;

/// Tables in dependency order, for counts and diagnostics.
pub const TABLES: &[&str] = &[
    "users",
    "clients",
    "leads",
    "matters",
    "matter_clients",
    "matter_users",
    "workflow_templates",
    "step_templates",
    "workflows",
    "workflow_steps",
    "compliance_templates",
    "compliance_questions",
    "compliance_template_questions",
    "compliance_checks",
    "compliance_answers",
    "documents",
    "integrations",
    "integration_logs",
];
