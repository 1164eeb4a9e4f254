//! Reference team and starter courses, written to an empty store on first start.

use crate::model::*;

fn user(id: &str, name: &str, role: Role, avatar: u32) -> User {
    User {
        id: id.into(),
        name: name.into(),
        avatar: format!("https://picsum.photos/id/{avatar}/100/100"),
        role,
    }
}

pub fn default_users() -> Vec<User> {
    vec![
        user("u1", "Alice Chen", Role::Engineer, 64),
        user("u2", "Bob Smith", Role::Engineer, 65),
        user("u3", "Charlie Kim", Role::Lead, 66),
        user("u4", "David Lee", Role::Engineer, 67),
    ]
}

fn question(id: &str, text: &str, options: [&str; 4], correct: u8) -> Question {
    Question {
        id: id.into(),
        text: text.into(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer_index: correct,
    }
}

fn course(id: &str, title: &str, description: &str, url: &str, created_by: &str, tags: &[&str]) -> Course {
    Course {
        id: id.into(),
        title: title.into(),
        description: description.into(),
        url: url.into(),
        duration_minutes: 15,
        created_by: created_by.into(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        quiz: None,
    }
}

pub fn default_courses() -> Vec<Course> {
    let mut k8s = course(
        "c1",
        "Kubernetes in 100 Seconds",
        "A quick, high-level overview of Kubernetes architecture and concepts.",
        "https://www.youtube.com/watch?v=lxxyY5e_h2o",
        "u3",
        &["K8s", "DevOps", "Cloud"],
    );
    k8s.quiz = Some(Quiz {
        questions: vec![
            question(
                "q1",
                "What is the smallest deployable unit in K8s?",
                ["Node", "Pod", "Container", "Cluster"],
                1,
            ),
            question(
                "q2",
                "Which component manages the cluster?",
                ["Worker Node", "Control Plane", "Kubelet", "Proxy"],
                1,
            ),
        ],
    });

    vec![
        k8s,
        course(
            "c2",
            "React in 100 Seconds",
            "Understand the core concepts of React: Components, State, and Props.",
            "https://www.youtube.com/watch?v=Tn6-PIqc4UM",
            "u1",
            &["Frontend", "React", "JS"],
        ),
        course(
            "c3",
            "Site Reliability Engineering in 100 Seconds",
            "What is SRE? Key concepts like SLIs, SLOs, and Error Budgets explained.",
            "https://www.youtube.com/watch?v=BrFE-9K4hHg",
            "u2",
            &["Ops", "SRE", "Process"],
        ),
        course(
            "c4",
            "WebSockets in 100 Seconds",
            "Learn how WebSockets enable real-time, bidirectional communication between clients and servers.",
            "https://www.youtube.com/watch?v=UBUNrFtufWo",
            "u3",
            &["Web", "Network", "Realtime"],
        ),
    ]
}

/// Events that populate an empty store.
pub fn seed_events() -> Vec<Event> {
    default_users()
        .into_iter()
        .map(|user| Event::UserAdded { user })
        .chain(default_courses().into_iter().map(|course| Event::CourseAdded { course }))
        .collect()
}
