#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

const REPLAY: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Replay a scenario",
        commands: &[
            "entity-tracker replay fixtures/library.toml",
            "entity-tracker replay fixtures/library.toml --output compact",
        ],
    },
    ExampleGroup {
        title: "Override the tracker settings",
        commands: &["entity-tracker replay fixtures/library.toml --config tracker.toml"],
    },
];

const CHECK: &[ExampleGroup] = &[ExampleGroup {
    title: "Validate a scenario without running it",
    commands: &["entity-tracker check fixtures/library.toml --output json"],
}];

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "replay",
            groups: REPLAY,
        },
        CommandExample {
            name: "check",
            groups: CHECK,
        },
    ]
}
